// FfmpegEncoder driven through the scheduler with a stand-in ffmpeg script

#![cfg(unix)]

use crate::common::fakes::ExtensionProbe;
use crate::common::helpers::media_tree;
use hevcsweep::engine::cascade::{Cascade, FfmpegEncoder};
use hevcsweep::engine::core::SOFTWARE_FALLBACK;
use hevcsweep::engine::scheduler::Scheduler;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Fails every `-hwaccel` attempt, writes the output (last argument) otherwise
const FAKE_FFMPEG: &str = r#"#!/bin/sh
for last; do :; done
case " $* " in
  *" -hwaccel "*) echo "No device available" >&2; exit 1 ;;
esac
echo "encoding $last" >&2
printf 'hevc' > "$last"
"#;

fn install_fake_ffmpeg(dir: &Path) -> PathBuf {
    let path = dir.join("fake-ffmpeg");
    fs::write(&path, FAKE_FFMPEG).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_cascade_falls_back_and_logs_every_attempt() {
    let tools = tempfile::TempDir::new().unwrap();
    let ffmpeg = install_fake_ffmpeg(tools.path());
    let root = media_tree(&[("clip.mkv", 64)]);

    let cascade = Cascade::from_matrix(
        &["cuda".to_string()],
        &["hevc_nvenc".to_string(), "hevc_qsv".to_string()],
        "",
        "libx265",
        "medium",
    );
    let report = Scheduler::new(
        Arc::new(ExtensionProbe::new()),
        Arc::new(FfmpegEncoder::new(&ffmpeg, Some(Duration::from_secs(30)))),
    )
    .with_cascade(cascade)
    .run(root.path())
    .unwrap();

    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.results[0].attempt(), Some(SOFTWARE_FALLBACK));
    assert_eq!(
        fs::read(root.path().join("Converted/clip_hevc.mp4")).unwrap(),
        b"hevc"
    );

    let logs: Vec<PathBuf> = fs::read_dir(root.path().join("Logs"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1, "One log per processed file");
    let log = fs::read_to_string(&logs[0]).unwrap();

    assert!(log.contains("=== Attempt cuda/hevc_nvenc ==="));
    assert!(log.contains("=== Attempt cuda/hevc_qsv ==="));
    assert!(log.contains("=== Attempt software-fallback ==="));
    assert!(log.contains("No device available"), "Encoder stderr is captured");
    assert!(log.contains("-crf"));
    assert_eq!(log.matches("=== Exit:").count(), 3);
}

#[test]
fn test_missing_ffmpeg_fails_job_not_run() {
    let root = media_tree(&[("a.mp4", 8), ("b.mp4", 16)]);

    let report = Scheduler::new(
        Arc::new(ExtensionProbe::new()),
        Arc::new(FfmpegEncoder::new("/nonexistent/ffmpeg", None)),
    )
    .run(root.path())
    .unwrap();

    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.failed, 2);
    assert!(report.summary.message().contains("\nFailed: "));
}
