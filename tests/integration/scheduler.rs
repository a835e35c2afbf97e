// Batch runs against in-process probe and encoder fakes

use crate::common::fakes::{ExtensionProbe, FakeEncoder};
use crate::common::helpers::{files_under, media_tree, write_sized};
use hevcsweep::engine::cascade::Cascade;
use hevcsweep::engine::core::{
    JobOutcome, OrderingPolicy, SOFTWARE_FALLBACK, VideoGeometry, select_params,
};
use hevcsweep::engine::error::DiscoveryError;
use hevcsweep::engine::scheduler::{RunEvent, RunOptions, Scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;

fn scheduler(encoder: &Arc<FakeEncoder>, concurrency: usize) -> Scheduler {
    Scheduler::new(Arc::new(ExtensionProbe::new()), encoder.clone()).with_options(RunOptions {
        concurrency,
        ..RunOptions::default()
    })
}

fn small_cascade() -> Cascade {
    Cascade::from_matrix(
        &["cuda".to_string(), "qsv".to_string()],
        &["hevc_nvenc".to_string()],
        "",
        "libx265",
        "medium",
    )
}

#[test]
fn test_end_to_end_all_succeed_first_attempt() {
    let root = media_tree(&[
        ("a.mp4", 100),
        ("b.mkv", 50),
        ("sub/c.avi", 200),
        ("notes.txt", 10),
    ]);
    let encoder = Arc::new(FakeEncoder::always_ok());

    let report = scheduler(&encoder, 2).run(root.path()).unwrap();

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.succeeded, 3);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(
        report.summary.skipped, 0,
        "Non-video files are filtered at discovery, not skipped"
    );
    assert!(!report.summary.cancelled);
    assert_eq!(report.results.len(), 3);
    assert_eq!(encoder.calls().len(), 3, "One attempt per file");

    for result in &report.results {
        assert_eq!(result.attempt(), Some("cuda/hevc_nvenc"));
    }

    let converted = files_under(&root.path().join("Converted"));
    assert_eq!(
        converted,
        vec![
            PathBuf::from("a_hevc.mp4"),
            PathBuf::from("b_hevc.mp4"),
            PathBuf::from("sub/c_hevc.mp4"),
        ]
    );
    assert!(root.path().join("Logs").is_dir());
    assert_eq!(report.summary.message(), "Finished: 3/3 succeeded, 0 failed");
    assert_eq!(report.summary.input_bytes, 350);
    assert_eq!(report.summary.output_bytes, 3 * "encoded".len() as u64);
}

#[test]
fn test_dispatch_order_smallest_first() {
    let root = media_tree(&[("big.mp4", 500), ("tiny.mp4", 10), ("mid.mp4", 300)]);
    let encoder = Arc::new(FakeEncoder::always_ok());

    scheduler(&encoder, 1).run(root.path()).unwrap();

    let sizes: Vec<u64> = encoder
        .started_sources()
        .iter()
        .map(|p| std::fs::metadata(p).unwrap().len())
        .collect();
    assert_eq!(sizes, vec![10, 300, 500]);
}

#[test]
fn test_dispatch_order_largest_first_via_events() {
    let root = media_tree(&[("big.mp4", 500), ("tiny.mp4", 10), ("mid.mp4", 300)]);
    let encoder = Arc::new(FakeEncoder::always_ok());
    let (tx, rx) = mpsc::channel();

    Scheduler::new(Arc::new(ExtensionProbe::new()), encoder.clone())
        .with_options(RunOptions {
            concurrency: 1,
            ordering: OrderingPolicy::LargestFirst,
            overwrite: true,
        })
        .with_events(tx)
        .run(root.path())
        .unwrap();

    let started: Vec<String> = rx
        .try_iter()
        .filter_map(|event| match event {
            RunEvent::JobStarted { source, .. } => {
                Some(source.file_name().unwrap().to_string_lossy().to_string())
            }
            _ => None,
        })
        .collect();
    assert_eq!(started, vec!["big.mp4", "mid.mp4", "tiny.mp4"]);
}

#[test]
fn test_software_fallback_after_accelerated_failures() {
    let root = media_tree(&[("a.mp4", 10), ("b.mp4", 20)]);
    let encoder = Arc::new(FakeEncoder::software_only());

    let report = scheduler(&encoder, 2)
        .with_cascade(small_cascade())
        .run(root.path())
        .unwrap();

    assert_eq!(report.summary.succeeded, 2);
    for result in &report.results {
        assert_eq!(result.attempt(), Some(SOFTWARE_FALLBACK));
    }

    let calls = encoder.calls();
    assert_eq!(calls.len(), 6, "Two accelerated attempts and one fallback per file");
    let fallbacks = calls
        .iter()
        .filter(|c| c.label == SOFTWARE_FALLBACK)
        .count();
    assert_eq!(fallbacks, 2, "Fallback runs exactly once per file");
}

#[test]
fn test_all_attempts_fail() {
    let root = media_tree(&[
        ("a.mp4", 10),
        ("b.mp4", 20),
        ("c.mp4", 30),
        ("d.mp4", 40),
    ]);
    let encoder = Arc::new(FakeEncoder::always_fail());

    let report = scheduler(&encoder, 2)
        .with_cascade(small_cascade())
        .run(root.path())
        .unwrap();

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.failed, 4);
    assert_eq!(report.summary.succeeded, 0);
    assert_eq!(report.summary.failed_samples.len(), 3);
    assert!(!report.summary.cleanup_eligible());
    assert!(
        report
            .results
            .iter()
            .all(|r| matches!(r.outcome, JobOutcome::Failed { .. }))
    );

    let message = report.summary.message();
    assert!(message.starts_with("Finished: 0/4 succeeded, 4 failed\nFailed: "));
    assert!(message.ends_with(", ..."), "More failures than samples: {}", message);

    assert!(
        files_under(&root.path().join("Converted")).is_empty(),
        "No output may survive an exhausted cascade"
    );
}

#[test]
fn test_skip_existing_outputs() {
    let root = media_tree(&[("a.mp4", 10), ("b.mp4", 20)]);
    write_sized(&root.path().join("Converted/a_hevc.mp4"), 5);
    let encoder = Arc::new(FakeEncoder::always_ok());

    let report = Scheduler::new(Arc::new(ExtensionProbe::new()), encoder.clone())
        .with_options(RunOptions {
            overwrite: false,
            ..RunOptions::default()
        })
        .run(root.path())
        .unwrap();

    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(
        encoder.started_sources(),
        vec![root.path().join("b.mp4")],
        "Skipped jobs never reach the encoder"
    );

    let skipped = report
        .results
        .iter()
        .find(|r| matches!(r.outcome, JobOutcome::Skipped { .. }))
        .unwrap();
    assert_eq!(skipped.source, root.path().join("a.mp4"));
    assert_eq!(
        std::fs::metadata(root.path().join("Converted/a_hevc.mp4"))
            .unwrap()
            .len(),
        5,
        "Existing output left untouched"
    );
}

#[test]
fn test_overwrite_reencodes_existing_outputs() {
    let root = media_tree(&[("a.mp4", 10)]);
    write_sized(&root.path().join("Converted/a_hevc.mp4"), 5);
    let encoder = Arc::new(FakeEncoder::always_ok());

    let report = scheduler(&encoder, 1).run(root.path()).unwrap();

    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(
        std::fs::read(root.path().join("Converted/a_hevc.mp4")).unwrap(),
        b"encoded"
    );
}

#[test]
fn test_second_run_ignores_own_outputs() {
    let root = media_tree(&[("a.mp4", 10), ("sub/b.mp4", 20)]);
    let encoder = Arc::new(FakeEncoder::always_ok());

    let first = scheduler(&encoder, 2).run(root.path()).unwrap();
    let second = scheduler(&encoder, 2).run(root.path()).unwrap();

    assert_eq!(first.summary.total, 2);
    assert_eq!(second.summary.total, 2, "Converted/ must not be rediscovered");
}

#[test]
fn test_missing_root_is_discovery_error() {
    let root = media_tree(&[]);
    let missing = root.path().join("nope");
    let encoder = Arc::new(FakeEncoder::always_ok());

    let result = scheduler(&encoder, 2).run(&missing);

    assert!(matches!(result, Err(DiscoveryError::RootMissing(_))));
    assert!(encoder.calls().is_empty());
    assert!(!missing.join("Converted").exists());
}

#[test]
fn test_root_that_is_a_file_is_discovery_error() {
    let root = media_tree(&[("a.mp4", 10)]);
    let encoder = Arc::new(FakeEncoder::always_ok());

    let result = scheduler(&encoder, 2).run(&root.path().join("a.mp4"));

    assert!(matches!(result, Err(DiscoveryError::NotADirectory(_))));
}

#[test]
fn test_empty_root() {
    let root = media_tree(&[("readme.txt", 10)]);
    let encoder = Arc::new(FakeEncoder::always_ok());

    let report = scheduler(&encoder, 2).run(root.path()).unwrap();

    assert_eq!(report.summary.total, 0);
    assert_eq!(report.summary.message(), "No eligible video files found");
    assert!(
        !root.path().join("Converted").exists(),
        "Nothing to do, nothing created"
    );
}

#[test]
fn test_event_stream() {
    let root = media_tree(&[("a.mp4", 10), ("b.mp4", 20), ("c.mp4", 30)]);
    let encoder = Arc::new(FakeEncoder::always_ok());
    let (tx, rx) = mpsc::channel();

    let report = scheduler(&encoder, 2)
        .with_events(tx)
        .run(root.path())
        .unwrap();
    let events: Vec<RunEvent> = rx.try_iter().collect();

    assert!(matches!(events.first(), Some(RunEvent::Discovered { total: 3 })));
    match events.last() {
        Some(RunEvent::Finished { summary, message }) => {
            assert_eq!(summary, &report.summary);
            assert_eq!(message, &report.summary.message());
        }
        other => panic!("Expected Finished last, got {:?}", other),
    }

    let processed: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|event| match event {
            RunEvent::JobFinished {
                processed, total, ..
            } => Some((*processed, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(processed, vec![(1, 3), (2, 3), (3, 3)]);

    let started = events
        .iter()
        .filter(|e| matches!(e, RunEvent::JobStarted { .. }))
        .count();
    assert_eq!(started, 3);
}

#[test]
fn test_plan_follows_probed_geometry() {
    let root = media_tree(&[("uhd.mp4", 10)]);
    let encoder = Arc::new(FakeEncoder::always_ok());
    let probe = ExtensionProbe {
        geometry: Some(VideoGeometry {
            width: 3840,
            height: 2160,
            frame_rate: 59.94,
        }),
        ..ExtensionProbe::new()
    };

    Scheduler::new(Arc::new(probe), encoder.clone())
        .run(root.path())
        .unwrap();

    assert_eq!(
        encoder.calls()[0].bitrate_kbps,
        select_params(3840, 59.94).bitrate_kbps
    );
}

#[test]
fn test_probe_failure_uses_default_geometry() {
    let root = media_tree(&[("odd.mkv", 10)]);
    let encoder = Arc::new(FakeEncoder::always_ok());

    let report = Scheduler::new(Arc::new(ExtensionProbe::failing()), encoder.clone())
        .run(root.path())
        .unwrap();

    assert_eq!(report.summary.succeeded, 1, "Probe failure is not a job failure");
    assert_eq!(
        encoder.calls()[0].bitrate_kbps,
        select_params(1920, 30.0).bitrate_kbps
    );
}

#[test]
fn test_plan_lists_dispatch_order_without_encoding() {
    let root = media_tree(&[("b.mp4", 20), ("a.mp4", 10), ("c.txt", 5)]);
    let encoder = Arc::new(FakeEncoder::always_ok());

    let sources = scheduler(&encoder, 2).plan(root.path()).unwrap();
    let paths: Vec<PathBuf> = sources.iter().map(|s| s.path.clone()).collect();

    assert_eq!(
        paths,
        vec![root.path().join("a.mp4"), root.path().join("b.mp4")]
    );
    assert!(encoder.calls().is_empty());
    assert!(!root.path().join("Converted").exists());
}
