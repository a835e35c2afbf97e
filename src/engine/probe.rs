// Input probing using ffprobe

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use super::core::{VideoGeometry, has_allowed_extension};
use super::error::ProbeError;

/// Answers "is this a video?" and "what does it look like?" for discovered files.
///
/// Implementations must not panic or propagate errors out of `is_eligible`; any failure
/// means the file is not eligible.
pub trait MediaProbe: Send + Sync {
    fn is_eligible(&self, path: &Path) -> bool;

    fn probe_geometry(&self, path: &Path) -> Result<VideoGeometry, ProbeError>;

    /// Geometry with the 1920x1080 @ 30fps defaults substituted on any failure
    fn describe(&self, path: &Path) -> VideoGeometry {
        self.probe_geometry(path).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

/// ffprobe-backed probe. One short-lived process per call, no retries.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: PathBuf,
    extensions: Vec<String>,
}

impl FfprobeProbe {
    pub fn new(program: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extensions,
        }
    }

    fn run(&self, path: &Path) -> Result<FfprobeOutput, ProbeError> {
        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0", // First video stream only
                "-show_entries",
                "stream=codec_type,width,height,r_frame_rate,avg_frame_rate",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(ProbeError::Spawn)?;

        if !output.status.success() {
            return Err(ProbeError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl MediaProbe for FfprobeProbe {
    fn is_eligible(&self, path: &Path) -> bool {
        if !has_allowed_extension(path, &self.extensions) {
            return false;
        }

        match self.run(path) {
            Ok(probe) => has_video_stream(&probe),
            Err(e) => {
                debug!("Not eligible {}: {}", path.display(), e);
                false
            }
        }
    }

    fn probe_geometry(&self, path: &Path) -> Result<VideoGeometry, ProbeError> {
        let probe = self.run(path)?;
        geometry_from_output(&probe)
    }
}

fn has_video_stream(probe: &FfprobeOutput) -> bool {
    probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("video"))
}

fn geometry_from_output(probe: &FfprobeOutput) -> Result<VideoGeometry, ProbeError> {
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().is_none_or(|t| t == "video"))
        .ok_or(ProbeError::NoVideoStream)?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(ProbeError::NoVideoStream),
    };

    // r_frame_rate first (more accurate); VFR streams may report "0/0" there
    let rates = [stream.r_frame_rate.as_deref(), stream.avg_frame_rate.as_deref()];
    let frame_rate = match rates.iter().flatten().find_map(|rate| parse_fraction(rate)) {
        Some(rate) => rate,
        None => {
            let seen = rates.iter().flatten().copied().collect::<Vec<_>>();
            let detail = if seen.is_empty() {
                "missing".to_string()
            } else {
                seen.join(", ")
            };
            return Err(ProbeError::FrameRate(detail));
        }
    };

    Ok(VideoGeometry {
        width,
        height,
        frame_rate,
    })
}

/// Parse ffprobe JSON (`-show_entries stream=...`) into geometry
pub fn parse_ffprobe_geometry(json: &str) -> Result<VideoGeometry, ProbeError> {
    let probe: FfprobeOutput = serde_json::from_str(json)?;
    geometry_from_output(&probe)
}

/// True when ffprobe JSON reports at least one video stream
pub fn parse_ffprobe_has_video(json: &str) -> bool {
    serde_json::from_str::<FfprobeOutput>(json)
        .map(|probe| has_video_stream(&probe))
        .unwrap_or(false)
}

/// Parse a fraction string like "30000/1001" (or a plain "25") to f64
fn parse_fraction(s: &str) -> Option<f64> {
    let value = match s.split_once('/') {
        Some((num, den)) => {
            let numerator: f64 = num.trim().parse().ok()?;
            let denominator: f64 = den.trim().parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        None => s.trim().parse().ok()?,
    };

    (value.is_finite() && value > 0.0).then_some(value)
}
