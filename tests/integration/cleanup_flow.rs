// Post-run source deletion on real run reports

use crate::common::fakes::{ExtensionProbe, FakeEncoder};
use crate::common::helpers::{files_under, media_tree, write_sized};
use hevcsweep::engine::cleanup::{CleanupReport, delete_sources, maybe_delete_sources};
use hevcsweep::engine::core::{JobResult, SOFTWARE_FALLBACK, SourceFile};
use hevcsweep::engine::scheduler::{RunOptions, Scheduler};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

#[test]
fn test_delete_after_clean_run_keeps_top_level_files() {
    let root = media_tree(&[
        ("top.mp4", 10),
        ("show/s01/ep1.mkv", 20),
        ("show/s01/ep2.mkv", 30),
    ]);
    let encoder = Arc::new(FakeEncoder::always_ok());
    let report = Scheduler::new(Arc::new(ExtensionProbe::new()), encoder)
        .run(root.path())
        .unwrap();
    assert!(report.summary.cleanup_eligible());

    let mut prompted = 0;
    let cleanup = maybe_delete_sources(root.path(), &report, |summary| {
        prompted += 1;
        assert_eq!(summary.succeeded, 3);
        true
    });

    assert_eq!(prompted, 1);
    assert_eq!(
        cleanup,
        Some(CleanupReport {
            deleted: 2,
            failed: 0,
            refused: 1
        })
    );
    assert!(root.path().join("top.mp4").exists(), "Direct child of root is never deleted");
    assert!(!root.path().join("show/s01/ep1.mkv").exists());
    assert!(!root.path().join("show/s01/ep2.mkv").exists());
    assert!(root.path().join("Converted/show/s01/ep1_hevc.mp4").exists());
    assert!(root.path().join("Converted/top_hevc.mp4").exists());
}

#[test]
fn test_no_prompt_after_failures() {
    let root = media_tree(&[("sub/a.mp4", 10), ("sub/b.mp4", 20)]);
    let encoder = Arc::new(FakeEncoder::with(|_, request| {
        !request.source.ends_with("b.mp4")
    }));
    let report = Scheduler::new(Arc::new(ExtensionProbe::new()), encoder)
        .run(root.path())
        .unwrap();
    assert_eq!(report.summary.failed, 1);

    let cleanup = maybe_delete_sources(root.path(), &report, |_| {
        panic!("A run with failures must not ask for deletion")
    });

    assert_eq!(cleanup, None);
    assert!(root.path().join("sub/a.mp4").exists());
    assert!(root.path().join("sub/b.mp4").exists());
}

#[test]
fn test_declined_confirmation_deletes_nothing() {
    let root = media_tree(&[("sub/a.mp4", 10)]);
    let encoder = Arc::new(FakeEncoder::always_ok());
    let report = Scheduler::new(Arc::new(ExtensionProbe::new()), encoder)
        .run(root.path())
        .unwrap();

    assert_eq!(maybe_delete_sources(root.path(), &report, |_| false), None);
    assert!(root.path().join("sub/a.mp4").exists());
}

#[test]
fn test_source_removed_between_run_and_cleanup() {
    let root = media_tree(&[("sub/a.mp4", 10), ("sub/b.mp4", 20)]);
    let encoder = Arc::new(FakeEncoder::always_ok());
    let report = Scheduler::new(Arc::new(ExtensionProbe::new()), encoder)
        .run(root.path())
        .unwrap();
    std::fs::remove_file(root.path().join("sub/a.mp4")).unwrap();

    let cleanup = maybe_delete_sources(root.path(), &report, |_| true).unwrap();

    assert_eq!(cleanup.deleted, 1);
    assert_eq!(cleanup.refused, 1);
    assert!(!root.path().join("sub/b.mp4").exists());
}

#[test]
fn test_same_stem_sources_get_separate_outputs_before_delete() {
    let root = media_tree(&[("sub/clip.mkv", 10), ("sub/clip.mp4", 20)]);
    let encoder = Arc::new(FakeEncoder::always_ok());
    let report = Scheduler::new(Arc::new(ExtensionProbe::new()), encoder)
        .with_options(RunOptions {
            concurrency: 1,
            ..RunOptions::default()
        })
        .run(root.path())
        .unwrap();

    assert_eq!(report.summary.succeeded, 2);
    let outputs: HashSet<_> = report
        .results
        .iter()
        .filter_map(|r| r.output_path().map(|p| p.to_path_buf()))
        .collect();
    assert_eq!(outputs.len(), 2, "Each source needs its own output");
    for output in &outputs {
        assert!(output.exists(), "{} was overwritten", output.display());
    }
    assert_eq!(
        files_under(&root.path().join("Converted")),
        vec![
            PathBuf::from("sub/clip_mkv_hevc.mp4"),
            PathBuf::from("sub/clip_mp4_hevc.mp4"),
        ]
    );

    let cleanup = maybe_delete_sources(root.path(), &report, |_| true).unwrap();
    assert_eq!(cleanup.deleted, 2);
}

#[test]
fn test_sources_sharing_an_output_are_kept() {
    let root = media_tree(&[("sub/clip.mkv", 10), ("sub/clip.mp4", 20)]);
    let shared = root.path().join("Converted/sub/clip_hevc.mp4");
    write_sized(&shared, 5);
    let results: Vec<JobResult> = ["sub/clip.mkv", "sub/clip.mp4"]
        .iter()
        .map(|name| {
            let source = SourceFile::new(root.path().join(name), 10);
            JobResult::succeeded(&source, SOFTWARE_FALLBACK, shared.clone())
        })
        .collect();

    let cleanup = delete_sources(root.path(), &results);

    assert_eq!(
        cleanup,
        CleanupReport {
            deleted: 0,
            failed: 0,
            refused: 2
        }
    );
    assert!(root.path().join("sub/clip.mkv").exists());
    assert!(root.path().join("sub/clip.mp4").exists());
}
