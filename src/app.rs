use crate::cli::{Cli, Commands};
use hevcsweep::config::Config;
use hevcsweep::engine::cascade::{build_attempt_cmd, format_cmd};
use hevcsweep::engine::{
    self, CancelToken, EncodeRequest, MediaProbe, PlannedJob, RunEvent, RunSummary, Scheduler,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::warn;

pub fn run(cli: Cli) {
    if let Some(command) = &cli.command {
        match command {
            Commands::CheckFfmpeg => handle_check_ffmpeg(),
            Commands::Probe { file } => handle_probe(file),
            Commands::Scan { directory } => handle_scan(&cli_config(&cli), directory.clone()),
            Commands::DryRun { directory } => {
                handle_dry_run(&cli_config(&cli), directory.clone())
            }
            Commands::InitConfig => handle_init_config(),
        }
        return;
    }

    handle_run(&cli);
}

/// Config file values with command-line overrides applied
fn cli_config(cli: &Cli) -> Config {
    let mut config = load_config();
    if let Some(jobs) = cli.jobs {
        config.defaults.concurrency = usize::from(jobs);
    }
    if let Some(order) = cli.order {
        config.defaults.ordering = order;
    }
    if cli.no_overwrite {
        config.defaults.overwrite = false;
    }
    config
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        warn!("{:#}; using built-in defaults", e);
        Config::default()
    })
}

fn resolve_dir(directory: Option<PathBuf>) -> PathBuf {
    let dir = directory
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    // A missing root is reported by discovery, keep the path as given
    dir.canonicalize().unwrap_or(dir)
}

fn build_scheduler(config: &Config) -> Scheduler {
    Scheduler::new(Arc::new(config.probe()), Arc::new(config.encoder()))
        .with_cascade(config.cascade())
        .with_layout(config.layout_settings())
        .with_options(config.run_options())
}

fn handle_run(cli: &Cli) {
    let config = cli_config(cli);
    let root = resolve_dir(cli.directory.clone());

    let (tx, rx) = mpsc::channel();
    let scheduler = build_scheduler(&config).with_events(tx);
    install_interrupt_handler(scheduler.cancel_token());

    println!(
        "Transcoding {} ({} workers, {})",
        root.display(),
        config.run_options().concurrency,
        config.defaults.ordering
    );

    let renderer = thread::spawn(move || render_events(rx));
    let result = scheduler.run(&root);
    // Closes the event channel so the renderer drains and exits
    drop(scheduler);
    let _ = renderer.join();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if report.summary.succeeded > 0 {
        println!("Space saved: {}", report.summary.format_space_saved());
    }

    let (delete, keep) = (cli.delete_sources, cli.keep_sources);
    let cleanup = engine::maybe_delete_sources(&root, &report, |summary| {
        if delete {
            true
        } else if keep {
            false
        } else {
            confirm_deletion(summary)
        }
    });
    if let Some(cleanup) = cleanup {
        println!(
            "Deleted {} source files ({} failed, {} kept by safety checks)",
            cleanup.deleted, cleanup.failed, cleanup.refused
        );
    }

    if report.summary.cancelled {
        process::exit(130);
    }
    if report.summary.failed > 0 {
        process::exit(1);
    }
}

fn render_events(rx: Receiver<RunEvent>) {
    for event in rx {
        match event {
            RunEvent::Discovered { total } => println!("Found {} eligible files", total),
            RunEvent::JobStarted { .. } => {}
            RunEvent::JobFinished {
                result,
                processed,
                total,
            } => {
                let name = result
                    .source
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let status = match &result.outcome {
                    engine::JobOutcome::Succeeded { attempt, .. } => format!("done ({})", attempt),
                    engine::JobOutcome::Failed { error } => format!("FAILED: {}", error),
                    engine::JobOutcome::Skipped { reason } => format!("skipped: {}", reason),
                };
                println!("[{}/{}] {} {}", processed, total, name, status);
            }
            RunEvent::Finished { message, .. } => println!("\n{}", message),
        }
    }
}

fn confirm_deletion(summary: &RunSummary) -> bool {
    print!(
        "All {} files converted. Delete the original files? [y/N] ",
        summary.succeeded
    );
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Stop dispatching; running encodes finish
    Cancel,
    Abort,
}

fn on_interrupt(presses: &AtomicUsize) -> InterruptAction {
    if presses.fetch_add(1, Ordering::SeqCst) == 0 {
        InterruptAction::Cancel
    } else {
        InterruptAction::Abort
    }
}

/// First Ctrl-C stops dispatching new jobs, the second exits immediately
fn install_interrupt_handler(cancel: CancelToken) {
    let presses = AtomicUsize::new(0);
    let installed = ctrlc::set_handler(move || match on_interrupt(&presses) {
        InterruptAction::Cancel => {
            eprintln!(
                "\nCancelling: waiting for running encodes to finish (Ctrl-C again to abort)"
            );
            cancel.cancel();
        }
        InterruptAction::Abort => process::exit(130),
    });

    if let Err(e) = installed {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }
}

fn handle_check_ffmpeg() {
    let config = load_config();

    for tool in [&config.tools.ffmpeg, &config.tools.ffprobe] {
        match engine::tool_version(tool) {
            Ok(version) => println!("{} found: {}", tool.display(), version),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                process::exit(1);
            }
        }
    }

    let mut codecs = config.cascade.codecs.clone();
    if !codecs.contains(&config.cascade.software_codec) {
        codecs.push(config.cascade.software_codec.clone());
    }
    match engine::available_encoders(&config.tools.ffmpeg, &codecs) {
        Ok(found) => {
            for codec in &codecs {
                let mark = if found.contains(codec) { "yes" } else { "no" };
                println!("  {:<12} {}", codec, mark);
            }
            if !found.contains(&config.cascade.software_codec) {
                eprintln!(
                    "Warning: software fallback '{}' is not available in this ffmpeg build",
                    config.cascade.software_codec
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_probe(file: &Path) {
    let probe = load_config().probe();

    if !probe.is_eligible(file) {
        eprintln!("{} is not an eligible video file", file.display());
        process::exit(1);
    }

    match probe.probe_geometry(file) {
        Ok(geometry) => {
            let plan = engine::select_params(geometry.width, geometry.frame_rate);
            println!(
                "Resolution: {}x{} @ {:.3} fps",
                geometry.width, geometry.height, geometry.frame_rate
            );
            println!(
                "Plan: bitrate {} / crf {}",
                plan.bitrate_arg(),
                plan.quality_factor
            );
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_scan(config: &Config, directory: Option<PathBuf>) {
    let dir = resolve_dir(directory);
    println!("Scanning directory: {}", dir.display());

    let scheduler = build_scheduler(config);
    let probe = config.probe();
    match scheduler.plan(&dir) {
        Ok(sources) => {
            for source in &sources {
                let geometry = probe.describe(&source.path);
                let plan = engine::select_params(geometry.width, geometry.frame_rate);
                println!(
                    "- {} ({}, {}x{}, {})",
                    source.path.display(),
                    engine::format_bytes(source.size_bytes),
                    geometry.width,
                    geometry.height,
                    plan.bitrate_arg()
                );
            }
            println!("Total files: {}", sources.len());
        }
        Err(e) => {
            eprintln!("Error scanning directory: {}", e);
            process::exit(1);
        }
    }
}

fn handle_dry_run(config: &Config, directory: Option<PathBuf>) {
    let dir = resolve_dir(directory);
    println!("Dry run: building ffmpeg commands for {}", dir.display());

    let scheduler = build_scheduler(config);
    let layout = scheduler.layout_for(&dir);
    let probe = config.probe();

    let jobs = match scheduler.plan_jobs(&dir) {
        Ok(jobs) => jobs,
        Err(e) => {
            eprintln!("Error scanning directory: {}", e);
            process::exit(1);
        }
    };

    for PlannedJob { source, output } in &jobs {
        let geometry = probe.describe(&source.path);
        let request = EncodeRequest {
            source: source.path.clone(),
            output: output.clone(),
            log: layout.log_path(&source.path, source.id),
            plan: engine::select_params(geometry.width, geometry.frame_rate),
        };

        println!("\n# {}", source.path.display());
        for attempt in scheduler.cascade().attempts() {
            let cmd = build_attempt_cmd(&config.tools.ffmpeg, attempt, &request);
            println!("{}", format_cmd(&cmd));
        }
    }
}

fn handle_init_config() {
    match Config::load() {
        Ok(cfg) => {
            match Config::config_path() {
                Ok(path) => println!("Config loaded successfully from {}", path.display()),
                Err(e) => println!("Config loaded, but config path unknown: {:#}", e),
            }
            println!("{:#?}", cfg);
        }
        Err(e) => {
            println!("Config missing or invalid: {:#}", e);
            println!("Creating default config...");

            if let Err(err) = Config::default().save() {
                eprintln!("Failed to save default config: {:#}", err);
                process::exit(1);
            }
            match Config::config_path() {
                Ok(path) => println!("Default config saved to {}", path.display()),
                Err(e) => println!("Default config saved (path unknown): {:#}", e),
            }
        }
    }
}
