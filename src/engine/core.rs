mod ffmpeg_info;
mod params;
mod paths;
mod scan;
mod summary;
mod types;

pub use ffmpeg_info::{available_encoders, tool_version};
pub use params::{EncodingPlan, select_params};
pub use paths::{LayoutSettings, OutputLayout, ensure_dir};
pub use scan::{
    OrderingPolicy, VIDEO_EXTENSIONS, default_extensions, discover, has_allowed_extension,
    order_sources, validate_root,
};
pub use summary::{FAILED_SAMPLE_LIMIT, RunSummary, format_bytes};
pub use types::{JobOutcome, JobResult, SOFTWARE_FALLBACK, SourceFile, VideoGeometry};
