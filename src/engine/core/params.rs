use serde::{Deserialize, Serialize};

/// Bitrate / quality target derived from source geometry.
///
/// `bitrate_kbps` drives the accelerated attempts, `quality_factor` (CRF) drives the
/// software fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingPlan {
    pub bitrate_kbps: u32,
    pub quality_factor: u32,
}

impl EncodingPlan {
    /// Bitrate formatted for `-b:v` (e.g. "3000k")
    pub fn bitrate_arg(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }
}

/// (max width, bitrate kbps, crf) bands, checked in order
const WIDTH_BANDS: &[(u32, u32, u32)] = &[
    (720, 800, 24),
    (1280, 1500, 23),
    (1920, 3000, 22),
    (2560, 4500, 21),
];

const TOP_BAND: (u32, u32) = (6000, 20);

/// Map source width and frame rate to an encoding plan.
///
/// Above 30 fps the bitrate is raised by 20% (truncated), the quality factor is unchanged.
pub fn select_params(width: u32, frame_rate: f64) -> EncodingPlan {
    let (bitrate_kbps, quality_factor) = WIDTH_BANDS
        .iter()
        .find(|(max_width, _, _)| width <= *max_width)
        .map(|&(_, bitrate, crf)| (bitrate, crf))
        .unwrap_or(TOP_BAND);

    let bitrate_kbps = if frame_rate > 30.0 {
        bitrate_kbps * 6 / 5
    } else {
        bitrate_kbps
    };

    EncodingPlan {
        bitrate_kbps,
        quality_factor,
    }
}
