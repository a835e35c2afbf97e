use crate::engine::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Width, height and frame rate of the first video stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

impl Default for VideoGeometry {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
        }
    }
}

/// A discovered, eligible input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: Uuid,
    pub path: PathBuf,
    pub size_bytes: u64,

    // Filled in by the worker right before encoding
    pub geometry: Option<VideoGeometry>,
}

impl SourceFile {
    pub fn new(path: PathBuf, size_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            path,
            size_bytes,
            geometry: None,
        }
    }

    /// Geometry to plan with. A successful probe is kept; a failed one yields the
    /// defaults and is retried on the next call.
    pub fn geometry_or_probe<F>(&mut self, probe: F) -> VideoGeometry
    where
        F: FnOnce(&Path) -> Result<VideoGeometry, ProbeError>,
    {
        if let Some(geometry) = self.geometry {
            return geometry;
        }

        match probe(&self.path) {
            Ok(geometry) => {
                self.geometry = Some(geometry);
                geometry
            }
            Err(e) => {
                debug!("Using default geometry for {}: {}", self.path.display(), e);
                VideoGeometry::default()
            }
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Label reported when the guaranteed software attempt produced the output
pub const SOFTWARE_FALLBACK: &str = "software-fallback";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Succeeded { attempt: String, output: PathBuf },
    Failed { error: String },
    Skipped { reason: String },
}

/// Exactly one per started job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub source: PathBuf,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn succeeded(source: &SourceFile, attempt: impl Into<String>, output: PathBuf) -> Self {
        Self {
            job_id: source.id,
            source: source.path.clone(),
            outcome: JobOutcome::Succeeded {
                attempt: attempt.into(),
                output,
            },
        }
    }

    pub fn failed(source: &SourceFile, error: impl Into<String>) -> Self {
        Self {
            job_id: source.id,
            source: source.path.clone(),
            outcome: JobOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn skipped(source: &SourceFile, reason: impl Into<String>) -> Self {
        Self {
            job_id: source.id,
            source: source.path.clone(),
            outcome: JobOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded { .. })
    }

    /// Attempt label for successful jobs
    pub fn attempt(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Succeeded { attempt, .. } => Some(attempt),
            _ => None,
        }
    }

    pub fn output_path(&self) -> Option<&Path> {
        match &self.outcome {
            JobOutcome::Succeeded { output, .. } => Some(output),
            _ => None,
        }
    }
}
