//! Post-run source deletion.
//!
//! Runs only after a clean run (no failures, not cancelled, at least one success) and an
//! explicit yes from the shell. Every path is canonicalized and must sit at least one
//! directory below the canonical root. A source is only removed while its own output is
//! still on disk and no other result claims the same output.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::core::{JobResult, RunSummary};
use super::error::CleanupRefusal;
use super::scheduler::RunReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    /// Deletions attempted but rejected by the filesystem
    pub failed: usize,
    /// Results that did not pass the safety checks
    pub refused: usize,
}

/// Decide whether `result`'s source may be deleted. Returns the canonical path to remove.
pub fn check_deletable(
    canonical_root: &Path,
    result: &JobResult,
) -> Result<PathBuf, CleanupRefusal> {
    let Some(output) = result.output_path() else {
        return Err(CleanupRefusal::NotSucceeded);
    };
    if !output.is_file() {
        return Err(CleanupRefusal::OutputMissing);
    }

    let canonical = fs::canonicalize(&result.source).map_err(|_| CleanupRefusal::Missing)?;

    // Component-wise: the nearest common ancestor with the root must be the root itself
    if !canonical.starts_with(canonical_root) {
        return Err(CleanupRefusal::OutsideRoot);
    }
    if canonical == canonical_root {
        return Err(CleanupRefusal::IsRoot);
    }
    if canonical.parent() == Some(canonical_root) {
        return Err(CleanupRefusal::TopLevel);
    }

    Ok(canonical)
}

/// Delete every eligible source. Best effort: failures are logged and counted.
pub fn delete_sources(root: &Path, results: &[JobResult]) -> CleanupReport {
    let mut report = CleanupReport::default();

    let canonical_root = match fs::canonicalize(root) {
        Ok(path) => path,
        Err(e) => {
            warn!("Cannot resolve root {}: {}; nothing deleted", root.display(), e);
            report.refused = results.iter().filter(|r| r.is_success()).count();
            return report;
        }
    };

    let mut claims: HashMap<PathBuf, usize> = HashMap::new();
    for output in results.iter().filter_map(|r| r.output_path()) {
        *claims.entry(output_key(output)).or_default() += 1;
    }

    for result in results.iter().filter(|r| r.is_success()) {
        let shared = result
            .output_path()
            .is_some_and(|output| claims[&output_key(output)] > 1);
        let checked = if shared {
            Err(CleanupRefusal::OutputShared)
        } else {
            check_deletable(&canonical_root, result)
        };

        let path = match checked {
            Ok(path) => path,
            Err(refusal) => {
                warn!("Keeping {}: {}", result.source.display(), refusal);
                report.refused += 1;
                continue;
            }
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted source {}", path.display());
                report.deleted += 1;
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }

    report
}

fn output_key(output: &Path) -> PathBuf {
    fs::canonicalize(output).unwrap_or_else(|_| output.to_path_buf())
}

/// Offer deletion for a finished run.
///
/// Returns `None` when the run is not eligible or `confirm` declines; `confirm` is only
/// asked for eligible runs.
pub fn maybe_delete_sources<F>(
    root: &Path,
    run: &RunReport,
    confirm: F,
) -> Option<CleanupReport>
where
    F: FnOnce(&RunSummary) -> bool,
{
    if !run.summary.cleanup_eligible() {
        return None;
    }

    if !confirm(&run.summary) {
        info!("Source deletion declined");
        return None;
    }

    Some(delete_sources(root, &run.results))
}
