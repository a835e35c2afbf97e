// Transcoding orchestrator core - independent of the shell

pub mod cascade;
pub mod cleanup;
pub mod core;
pub mod error;
pub mod probe;
pub mod scheduler;

pub use cascade::{AttemptSpec, Cascade, CascadeOutcome, EncodeRequest, Encoder, FfmpegEncoder};
pub use cleanup::{CleanupReport, delete_sources, maybe_delete_sources};
pub use core::*;
pub use error::{CleanupRefusal, DiscoveryError, EncodeError, ProbeError};
pub use probe::{FfprobeProbe, MediaProbe};
pub use scheduler::{CancelToken, PlannedJob, RunEvent, RunOptions, RunReport, Scheduler};
