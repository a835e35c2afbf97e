#![allow(dead_code)]

use hevcsweep::engine::cascade::{AttemptSpec, EncodeRequest, Encoder};
use hevcsweep::engine::core::{VideoGeometry, default_extensions, has_allowed_extension};
use hevcsweep::engine::error::{EncodeError, ProbeError};
use hevcsweep::engine::probe::MediaProbe;
use hevcsweep::engine::scheduler::CancelToken;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Eligible by extension; every file reports the same geometry
pub struct ExtensionProbe {
    pub extensions: Vec<String>,
    pub geometry: Option<VideoGeometry>,
}

impl ExtensionProbe {
    pub fn new() -> Self {
        Self {
            extensions: default_extensions(),
            geometry: Some(VideoGeometry::default()),
        }
    }

    /// Probing always fails, so jobs fall back to default geometry
    pub fn failing() -> Self {
        Self {
            geometry: None,
            ..Self::new()
        }
    }
}

impl MediaProbe for ExtensionProbe {
    fn is_eligible(&self, path: &Path) -> bool {
        has_allowed_extension(path, &self.extensions)
    }

    fn probe_geometry(&self, _path: &Path) -> Result<VideoGeometry, ProbeError> {
        self.geometry.ok_or(ProbeError::NoVideoStream)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAttempt {
    pub label: String,
    pub source: PathBuf,
    pub bitrate_kbps: u32,
}

/// In-process encoder: writes a small output for attempts it accepts
pub struct FakeEncoder {
    accept: Box<dyn Fn(&AttemptSpec, &EncodeRequest) -> bool + Send + Sync>,
    calls: Mutex<Vec<RecordedAttempt>>,
    cancel_on_first: Option<CancelToken>,
}

impl FakeEncoder {
    /// Every attempt succeeds, so each job finishes on the first accelerated attempt
    pub fn always_ok() -> Self {
        Self::with(|_, _| true)
    }

    /// Only the software fallback succeeds
    pub fn software_only() -> Self {
        Self::with(|attempt, _| attempt.is_software())
    }

    pub fn always_fail() -> Self {
        Self::with(|_, _| false)
    }

    pub fn with<F>(accept: F) -> Self
    where
        F: Fn(&AttemptSpec, &EncodeRequest) -> bool + Send + Sync + 'static,
    {
        Self {
            accept: Box::new(accept),
            calls: Mutex::new(Vec::new()),
            cancel_on_first: None,
        }
    }

    /// Request cancellation while the first attempt is running
    pub fn cancelling(mut self, token: CancelToken) -> Self {
        self.cancel_on_first = Some(token);
        self
    }

    pub fn calls(&self) -> Vec<RecordedAttempt> {
        self.calls.lock().unwrap().clone()
    }

    /// Sources in the order their first attempt ran
    pub fn started_sources(&self) -> Vec<PathBuf> {
        let mut seen = Vec::new();
        for call in self.calls() {
            if !seen.contains(&call.source) {
                seen.push(call.source);
            }
        }
        seen
    }
}

impl Encoder for FakeEncoder {
    fn run_attempt(
        &self,
        attempt: &AttemptSpec,
        request: &EncodeRequest,
    ) -> Result<bool, EncodeError> {
        self.calls.lock().unwrap().push(RecordedAttempt {
            label: attempt.label(),
            source: request.source.clone(),
            bitrate_kbps: request.plan.bitrate_kbps,
        });

        if let Some(token) = &self.cancel_on_first {
            token.cancel();
        }

        if (self.accept)(attempt, request) {
            fs::write(&request.output, b"encoded").map_err(|e| EncodeError::Io {
                path: request.output.clone(),
                source: e,
            })?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
