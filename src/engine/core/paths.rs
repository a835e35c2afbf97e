use chrono::Local;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Names that define the produced layout, independent of any particular root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSettings {
    pub output_dir_name: String,
    pub log_dir_name: String,
    pub suffix: String,
    pub container: String,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            output_dir_name: "Converted".to_string(),
            log_dir_name: "Logs".to_string(),
            suffix: "_hevc".to_string(),
            container: "mp4".to_string(),
        }
    }
}

impl LayoutSettings {
    pub fn for_root(&self, root: &Path) -> OutputLayout {
        OutputLayout::new(
            root,
            &self.output_dir_name,
            &self.log_dir_name,
            &self.suffix,
            &self.container,
        )
    }
}

/// Where outputs and per-job logs go for a given root
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub suffix: String,
    pub container: String,
}

impl OutputLayout {
    pub fn new(
        root: &Path,
        output_dir_name: &str,
        log_dir_name: &str,
        suffix: &str,
        container: &str,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            output_dir: root.join(output_dir_name),
            log_dir: root.join(log_dir_name),
            suffix: suffix.to_string(),
            container: container.trim_start_matches('.').to_string(),
        }
    }

    /// Directories discovery must not descend into
    pub fn excluded_dirs(&self) -> Vec<PathBuf> {
        vec![self.output_dir.clone(), self.log_dir.clone()]
    }

    /// Mirror `input`'s position under root into the output tree:
    /// `root/a/b/clip.mkv` -> `root/Converted/a/b/clip_hevc.mp4`
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let relative = input.strip_prefix(&self.root).unwrap_or(input);
        let stem = relative
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let file_name = format!("{}{}.{}", stem, self.suffix, self.container);

        match relative.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && relative.is_relative() => {
                self.output_dir.join(parent).join(file_name)
            }
            _ => self.output_dir.join(file_name),
        }
    }

    /// Output paths for a whole batch, index-aligned with `inputs`.
    ///
    /// Sources whose default output would clash (`clip.mkv` and `clip.mp4` in one
    /// folder) keep their extension in the name: `clip_mkv_hevc.mp4`. Comparison ignores
    /// case so the result is also unique on case-insensitive filesystems.
    pub fn output_paths(&self, inputs: &[&Path]) -> Vec<PathBuf> {
        let defaults: Vec<PathBuf> = inputs.iter().map(|p| self.output_path(p)).collect();
        let mut claims: HashMap<String, usize> = HashMap::new();
        for path in &defaults {
            *claims.entry(collision_key(path)).or_default() += 1;
        }

        let mut taken: HashSet<String> = HashSet::new();
        inputs
            .iter()
            .zip(defaults)
            .map(|(input, default)| {
                let base = if claims[&collision_key(&default)] > 1 {
                    self.output_path_with_extension(input)
                } else {
                    default
                };
                // Still clashing (e.g. `clip.mkv` next to `clip_mkv.avi`): number it
                let mut path = base.clone();
                let mut n = 2;
                while !taken.insert(collision_key(&path)) {
                    path = numbered(&base, n);
                    n += 1;
                }
                path
            })
            .collect()
    }

    fn output_path_with_extension(&self, input: &Path) -> PathBuf {
        let default = self.output_path(input);
        match (input.file_stem(), input.extension()) {
            (Some(stem), Some(ext)) => default.with_file_name(format!(
                "{}_{}{}.{}",
                stem.to_string_lossy(),
                ext.to_string_lossy(),
                self.suffix,
                self.container
            )),
            _ => default,
        }
    }

    /// A log file name unique per job: `<stem>_<YYYYmmdd_HHMMSS>_<id8>.log`
    pub fn log_path(&self, input: &Path, job_id: Uuid) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "job".to_string());
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let id = job_id.simple().to_string();

        self.log_dir
            .join(format!("{}_{}_{}.log", stem, timestamp, &id[..8]))
    }

    /// Create the output and log roots
    pub fn prepare(&self) -> io::Result<()> {
        ensure_dir(&self.output_dir)?;
        ensure_dir(&self.log_dir)
    }
}

fn collision_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

fn numbered(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match path.extension() {
        Some(ext) => path.with_file_name(format!("{}_{}.{}", stem, n, ext.to_string_lossy())),
        None => path.with_file_name(format!("{}_{}", stem, n)),
    }
}

/// Create a directory and its parents; concurrent creation by other workers is fine
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}
