use super::types::SourceFile;
use crate::engine::error::DiscoveryError;
use crate::engine::probe::MediaProbe;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Container formats considered for transcoding
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "ts", "webm"];

pub fn default_extensions() -> Vec<String> {
    VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

/// Check a path's extension (case-insensitive) against an allow-list
pub fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Order in which discovered files are dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingPolicy {
    /// Smallest files first so completed work accrues quickly
    #[default]
    SmallestFirst,
    LargestFirst,
    /// Walk order, sorted by path for determinism
    Discovery,
}

impl OrderingPolicy {
    pub const ALL: [OrderingPolicy; 3] = [
        OrderingPolicy::SmallestFirst,
        OrderingPolicy::LargestFirst,
        OrderingPolicy::Discovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmallestFirst => "smallest-first",
            Self::LargestFirst => "largest-first",
            Self::Discovery => "discovery",
        }
    }
}

impl fmt::Display for OrderingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|p| p.as_str() == s).ok_or_else(|| {
            format!(
                "unknown ordering '{}' (expected smallest-first, largest-first or discovery)",
                s
            )
        })
    }
}

/// Sort sources in place. Ties fall back to path order so runs are reproducible.
pub fn order_sources(sources: &mut [SourceFile], policy: OrderingPolicy) {
    match policy {
        OrderingPolicy::SmallestFirst => sources.sort_by(|a, b| {
            a.size_bytes
                .cmp(&b.size_bytes)
                .then_with(|| a.path.cmp(&b.path))
        }),
        OrderingPolicy::LargestFirst => sources.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| a.path.cmp(&b.path))
        }),
        OrderingPolicy::Discovery => sources.sort_by(|a, b| a.path.cmp(&b.path)),
    }
}

/// Check the root before walking it
pub fn validate_root(root: &Path) -> Result<(), DiscoveryError> {
    let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DiscoveryError::RootMissing(root.to_path_buf()),
        _ => DiscoveryError::Unreadable {
            path: root.to_path_buf(),
            source: e,
        },
    })?;

    if !metadata.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    std::fs::read_dir(root).map_err(|e| DiscoveryError::Unreadable {
        path: root.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// Walk `root` recursively and return every file the probe accepts.
///
/// Directories listed in `exclude` (the output and log trees) are not descended into.
/// Symlinks are not followed.
pub fn discover(
    root: &Path,
    exclude: &[PathBuf],
    probe: &dyn MediaProbe,
) -> Result<Vec<SourceFile>, DiscoveryError> {
    validate_root(root)?;

    let mut sources = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !exclude.iter().any(|ex| entry.path() == ex.as_path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !probe.is_eligible(path) {
            debug!("Ignoring {}", path.display());
            continue;
        }

        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        sources.push(SourceFile::new(path.to_path_buf(), size_bytes));
    }

    Ok(sources)
}
