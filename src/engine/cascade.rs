//! Encoder selection cascade.
//!
//! A cascade is plain data: an ordered list of accelerated [`AttemptSpec`]s followed by one
//! software-only attempt that is always present. Every attempt goes through the same
//! [`Encoder::run_attempt`] routine.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::core::{EncodingPlan, SOFTWARE_FALLBACK};
use super::error::EncodeError;

/// Default accelerators, in priority order
pub const DEFAULT_ACCELERATORS: &[&str] = &["cuda", "dxva2", "qsv", "d3d11va", "opencl", "vulkan"];

/// Default HEVC encoders tried with each accelerator (vendor encoders, then software HEVC on
/// a hardware decode path)
pub const DEFAULT_CODECS: &[&str] = &["hevc_nvenc", "hevc_qsv", "hevc_amf", "libx265"];

pub const DEFAULT_SOFTWARE_CODEC: &str = "libx265";
pub const DEFAULT_SOFTWARE_PRESET: &str = "medium";

/// Which field of the [`EncodingPlan`] an attempt is driven by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// `-b:v <bitrate>`
    Bitrate,
    /// `-crf <quality factor>`
    Quality,
}

/// One entry of the cascade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSpec {
    /// `-hwaccel` value; `None` for the software-only attempt
    pub accelerator: Option<String>,
    pub codec: String,
    pub rate_control: RateControl,
    pub preset: Option<String>,
    pub extra_args: Vec<String>,
}

impl AttemptSpec {
    pub fn accelerated(accelerator: &str, codec: &str, extra_args: Vec<String>) -> Self {
        Self {
            accelerator: Some(accelerator.to_string()),
            codec: codec.to_string(),
            rate_control: RateControl::Bitrate,
            preset: None,
            extra_args,
        }
    }

    /// Software-only encode at the plan's quality factor. Needs no hardware.
    pub fn software(codec: &str, preset: &str) -> Self {
        Self {
            accelerator: None,
            codec: codec.to_string(),
            rate_control: RateControl::Quality,
            preset: Some(preset.to_string()).filter(|p| !p.is_empty()),
            extra_args: Vec::new(),
        }
    }

    pub fn is_software(&self) -> bool {
        self.accelerator.is_none()
    }

    /// Name reported in results and logs, e.g. "cuda/hevc_nvenc"
    pub fn label(&self) -> String {
        match &self.accelerator {
            Some(accel) => format!("{}/{}", accel, self.codec),
            None => SOFTWARE_FALLBACK.to_string(),
        }
    }
}

/// Paths and plan for one job, shared by every attempt
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub log: PathBuf,
    pub plan: EncodingPlan,
}

/// Runs a single external encode. `Ok(true)` means the process exited with status zero.
pub trait Encoder: Send + Sync {
    fn run_attempt(&self, attempt: &AttemptSpec, request: &EncodeRequest)
    -> Result<bool, EncodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    Encoded { attempt: String, tried: usize },
    Exhausted { tried: usize, last_error: Option<String> },
}

impl CascadeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Encoded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Cascade {
    accelerated: Vec<AttemptSpec>,
    fallback: AttemptSpec,
}

impl Default for Cascade {
    fn default() -> Self {
        let accelerators: Vec<String> =
            DEFAULT_ACCELERATORS.iter().map(|s| s.to_string()).collect();
        let codecs: Vec<String> = DEFAULT_CODECS.iter().map(|s| s.to_string()).collect();
        Self::from_matrix(
            &accelerators,
            &codecs,
            "",
            DEFAULT_SOFTWARE_CODEC,
            DEFAULT_SOFTWARE_PRESET,
        )
    }
}

impl Cascade {
    pub fn new(accelerated: Vec<AttemptSpec>, fallback: AttemptSpec) -> Self {
        Self {
            accelerated,
            fallback,
        }
    }

    /// Accelerator-major cross product of accelerators and codecs, then the software fallback.
    /// `extra_args` is a shell-quoted string appended to every accelerated attempt.
    pub fn from_matrix(
        accelerators: &[String],
        codecs: &[String],
        extra_args: &str,
        software_codec: &str,
        software_preset: &str,
    ) -> Self {
        let extra = split_extra_args(extra_args);
        let accelerated = accelerators
            .iter()
            .flat_map(|accel| {
                codecs
                    .iter()
                    .map(|codec| AttemptSpec::accelerated(accel, codec, extra.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        Self::new(
            accelerated,
            AttemptSpec::software(software_codec, software_preset),
        )
    }

    /// Every attempt in order; the software fallback is always last
    pub fn attempts(&self) -> impl Iterator<Item = &AttemptSpec> {
        self.accelerated.iter().chain(std::iter::once(&self.fallback))
    }

    pub fn len(&self) -> usize {
        self.accelerated.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Try each attempt until one succeeds.
    ///
    /// Success is exit status zero and the output file existing afterwards. The output's
    /// content is not validated, so a truncated file from a crashed encoder that still
    /// exited zero counts as success.
    pub fn encode(&self, encoder: &dyn Encoder, request: &EncodeRequest) -> CascadeOutcome {
        let mut tried = 0;
        let mut last_error = None;

        for attempt in self.attempts() {
            tried += 1;
            let label = attempt.label();

            // A leftover from an earlier attempt or run must not read as success
            if let Err(e) = remove_stale_output(&request.output) {
                warn!("{}: {}", label, e);
                last_error = Some(e.to_string());
                continue;
            }

            debug!("Trying {} for {}", label, request.source.display());
            match encoder.run_attempt(attempt, request) {
                Ok(true) if request.output.exists() => {
                    return CascadeOutcome::Encoded {
                        attempt: label,
                        tried,
                    };
                }
                Ok(true) => {
                    debug!("{} exited cleanly but wrote no output", label);
                    last_error = Some(format!("{} produced no output file", label));
                }
                Ok(false) => {
                    debug!("{} failed for {}", label, request.source.display());
                    last_error = Some(format!("{} exited with an error", label));
                }
                Err(e) => {
                    debug!("{} could not run: {}", label, e);
                    last_error = Some(format!("{}: {}", label, e));
                }
            }
        }

        // Don't leave a partial file from the last attempt behind
        if let Err(e) = remove_stale_output(&request.output) {
            warn!("{}", e);
        }

        CascadeOutcome::Exhausted { tried, last_error }
    }
}

fn remove_stale_output(output: &Path) -> Result<(), EncodeError> {
    match fs::remove_file(output) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EncodeError::Io {
            path: output.to_path_buf(),
            source: e,
        }),
    }
}

/// Split a shell-quoted argument string
pub fn split_extra_args(extra_args: &str) -> Vec<String> {
    if extra_args.trim().is_empty() {
        return Vec::new();
    }

    // Use shlex for shell-style parsing (respects quotes)
    shlex::split(extra_args).unwrap_or_else(|| {
        // Unbalanced quotes: fall back to simple whitespace split
        extra_args.split_whitespace().map(str::to_string).collect()
    })
}

/// Build the ffmpeg invocation for one attempt
pub fn build_attempt_cmd(
    program: &Path,
    attempt: &AttemptSpec,
    request: &EncodeRequest,
) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg("-hide_banner").arg("-nostdin").arg("-y");

    if let Some(accel) = &attempt.accelerator {
        cmd.arg("-hwaccel").arg(accel);
    }

    cmd.arg("-i").arg(&request.source);
    cmd.arg("-c:v").arg(&attempt.codec);

    match attempt.rate_control {
        RateControl::Bitrate => {
            cmd.arg("-b:v").arg(request.plan.bitrate_arg());
        }
        RateControl::Quality => {
            cmd.arg("-crf").arg(request.plan.quality_factor.to_string());
        }
    }

    if let Some(preset) = &attempt.preset {
        cmd.arg("-preset").arg(preset);
    }

    cmd.args(&attempt.extra_args);
    cmd.arg("-c:a").arg("copy");
    cmd.arg(&request.output);
    cmd
}

/// Format a command as a shell-safe string for display
pub fn format_cmd(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|arg| {
            let s = arg.to_string_lossy();
            match shlex::try_quote(&s) {
                Ok(quoted) => quoted.into_owned(),
                Err(_) => s.into_owned(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// ffmpeg-backed encoder. Stderr of every attempt is appended to the job's log file.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Encoder for FfmpegEncoder {
    fn run_attempt(
        &self,
        attempt: &AttemptSpec,
        request: &EncodeRequest,
    ) -> Result<bool, EncodeError> {
        let mut cmd = build_attempt_cmd(&self.program, attempt, request);
        let mut log = open_log(&request.log)?;
        let log_io = |e: std::io::Error| EncodeError::Io {
            path: request.log.clone(),
            source: e,
        };

        writeln!(log, "=== Attempt {} ===", attempt.label()).map_err(log_io)?;
        writeln!(log, "{}", format_cmd(&cmd)).map_err(log_io)?;
        let stderr = log.try_clone().map_err(log_io)?;

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::from(stderr));
        detach_from_terminal_signals(&mut cmd);

        let child = cmd.spawn().map_err(EncodeError::Spawn)?;
        let status = wait_with_timeout(child, self.timeout);

        let _ = match &status {
            Ok(status) => writeln!(log, "=== Exit: {} ===\n", status),
            Err(e) => writeln!(log, "=== Error: {} ===\n", e),
        };

        Ok(status?.success())
    }
}

/// Ctrl-C cancels the batch, not the encode already running
#[cfg(unix)]
fn detach_from_terminal_signals(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn detach_from_terminal_signals(_cmd: &mut Command) {}

fn open_log(path: &Path) -> Result<File, EncodeError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EncodeError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Wait for the child, killing it if it outlives `timeout`
fn wait_with_timeout(
    mut child: Child,
    timeout: Option<Duration>,
) -> Result<ExitStatus, EncodeError> {
    let Some(timeout) = timeout else {
        return child.wait().map_err(EncodeError::Wait);
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(EncodeError::Wait)? {
            return Ok(status);
        }

        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EncodeError::Timeout(timeout));
        }

        thread::sleep(Duration::from_millis(200).min(timeout));
    }
}
