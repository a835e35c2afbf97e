// Run summary and the human-readable notification text

use super::types::{JobOutcome, JobResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How many failing file names the notification lists
pub const FAILED_SAMPLE_LIMIT: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Eligible files found at discovery
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,

    /// First few failing base names, in completion order
    pub failed_samples: Vec<String>,

    /// Bytes of sources that transcoded successfully
    pub input_bytes: u64,
    /// Bytes of the outputs they produced
    pub output_bytes: u64,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Tally one finished job
    pub fn record(&mut self, result: &JobResult, source_bytes: u64) {
        match &result.outcome {
            JobOutcome::Succeeded { output, .. } => {
                self.succeeded += 1;
                self.input_bytes += source_bytes;
                self.output_bytes += std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
            }
            JobOutcome::Failed { .. } => {
                self.failed += 1;
                if self.failed_samples.len() < FAILED_SAMPLE_LIMIT {
                    self.failed_samples.push(base_name(&result.source));
                }
            }
            JobOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Jobs that produced a result
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    /// Jobs that never started because the run was cancelled
    pub fn not_started(&self) -> usize {
        self.total.saturating_sub(self.completed())
    }

    /// Sources may only be offered for deletion after a clean, complete run
    pub fn cleanup_eligible(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.succeeded > 0
    }

    /// Notification text shown by the shell at the end of a run
    pub fn message(&self) -> String {
        if self.total == 0 {
            return "No eligible video files found".to_string();
        }

        if self.cancelled {
            return format!("Cancelled: completed {}/{}", self.succeeded, self.total);
        }

        let mut summary = format!(
            "Finished: {}/{} succeeded, {} failed",
            self.succeeded, self.total, self.failed
        );
        if self.skipped > 0 {
            summary.push_str(&format!(", {} skipped", self.skipped));
        }
        if !self.failed_samples.is_empty() {
            summary.push_str(&format!("\nFailed: {}", self.failed_samples.join(", ")));
            if self.failed > self.failed_samples.len() {
                summary.push_str(", ...");
            }
        }
        summary
    }

    /// Format space saved
    pub fn format_space_saved(&self) -> String {
        let space_saved = self.input_bytes as i64 - self.output_bytes as i64;
        if space_saved >= 0 {
            format!("{} saved", format_bytes(space_saved as u64))
        } else {
            format!("{} larger", format_bytes((-space_saved) as u64))
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
