// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::engine::cascade::{
    Cascade, DEFAULT_ACCELERATORS, DEFAULT_CODECS, DEFAULT_SOFTWARE_CODEC, DEFAULT_SOFTWARE_PRESET,
    FfmpegEncoder,
};
use crate::engine::core::{LayoutSettings, OrderingPolicy, default_extensions};
use crate::engine::probe::FfprobeProbe;
use crate::engine::scheduler::{DEFAULT_CONCURRENCY, RunOptions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub cascade: CascadeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Number of files encoded at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Dispatch order: smallest-first, largest-first or discovery
    #[serde(default)]
    pub ordering: OrderingPolicy,

    /// Re-encode files whose output already exists (false: record them as skipped)
    #[serde(default = "default_true")]
    pub overwrite: bool,

    #[serde(default = "default_output_dir_name")]
    pub output_dir_name: String,

    #[serde(default = "default_log_dir_name")]
    pub log_dir_name: String,

    /// Appended to each output's base name
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    #[serde(default = "default_container")]
    pub container: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,

    /// Kill an encode attempt after this many seconds. Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encode_timeout_secs: Option<u64>,

    /// File extensions considered for encoding (case-insensitive, no dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Tried in order; each is paired with every codec below
    #[serde(default = "default_accelerators")]
    pub accelerators: Vec<String>,

    #[serde(default = "default_codecs")]
    pub codecs: Vec<String>,

    /// Extra ffmpeg arguments for accelerated attempts (shell-quoted)
    #[serde(default)]
    pub extra_args: String,

    #[serde(default = "default_software_codec")]
    pub software_codec: String,

    #[serde(default = "default_software_preset")]
    pub software_preset: String,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_true() -> bool {
    true
}

fn default_output_dir_name() -> String {
    LayoutSettings::default().output_dir_name
}

fn default_log_dir_name() -> String {
    LayoutSettings::default().log_dir_name
}

fn default_output_suffix() -> String {
    LayoutSettings::default().suffix
}

fn default_container() -> String {
    LayoutSettings::default().container
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_accelerators() -> Vec<String> {
    DEFAULT_ACCELERATORS.iter().map(|s| s.to_string()).collect()
}

fn default_codecs() -> Vec<String> {
    DEFAULT_CODECS.iter().map(|s| s.to_string()).collect()
}

fn default_software_codec() -> String {
    DEFAULT_SOFTWARE_CODEC.to_string()
}

fn default_software_preset() -> String {
    DEFAULT_SOFTWARE_PRESET.to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            ordering: OrderingPolicy::default(),
            overwrite: true,
            output_dir_name: default_output_dir_name(),
            log_dir_name: default_log_dir_name(),
            output_suffix: default_output_suffix(),
            container: default_container(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            encode_timeout_secs: None,
            extensions: default_extensions(),
        }
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            accelerators: default_accelerators(),
            codecs: default_codecs(),
            extra_args: String::new(),
            software_codec: default_software_codec(),
            software_preset: default_software_preset(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("hevcsweep")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("hevcsweep")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            Self::from_toml(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })
        } else {
            let config = Config::default();

            // Not fatal: a read-only config dir still gets built-in defaults
            if let Err(e) = config.save() {
                warn!("Could not create default config file: {:#}", e);
                warn!("Using built-in defaults. Run 'hevcsweep init-config' to create one.");
            }

            Ok(config)
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid config TOML")
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            concurrency: self.defaults.concurrency.max(1),
            ordering: self.defaults.ordering,
            overwrite: self.defaults.overwrite,
        }
    }

    pub fn layout_settings(&self) -> LayoutSettings {
        LayoutSettings {
            output_dir_name: self.defaults.output_dir_name.clone(),
            log_dir_name: self.defaults.log_dir_name.clone(),
            suffix: self.defaults.output_suffix.clone(),
            container: self.defaults.container.clone(),
        }
    }

    pub fn cascade(&self) -> Cascade {
        Cascade::from_matrix(
            &self.cascade.accelerators,
            &self.cascade.codecs,
            &self.cascade.extra_args,
            &self.cascade.software_codec,
            &self.cascade.software_preset,
        )
    }

    pub fn probe(&self) -> FfprobeProbe {
        FfprobeProbe::new(&self.tools.ffprobe, self.tools.extensions.clone())
    }

    pub fn encoder(&self) -> FfmpegEncoder {
        let timeout = self
            .tools
            .encode_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        FfmpegEncoder::new(&self.tools.ffmpeg, timeout)
    }
}
