// Batch scheduler: discovery, ordering, bounded worker pool and result aggregation

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cascade::{Cascade, CascadeOutcome, EncodeRequest, Encoder};
use super::core::{
    JobResult, LayoutSettings, OrderingPolicy, OutputLayout, RunSummary, SourceFile, discover,
    ensure_dir, order_sources, select_params,
};
use super::error::DiscoveryError;
use super::probe::MediaProbe;

/// Default worker count. Hardware encoders are often serialized by the device, so keep it small.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// One-way cancellation signal. Safe to set repeatedly from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Message from the scheduler to the shell
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Discovery finished; `total` eligible files will be dispatched
    Discovered { total: usize },

    /// A worker picked up a job
    JobStarted {
        job_id: Uuid,
        source: PathBuf,
        worker_id: usize,
    },

    /// A job produced its result (completion order, not submission order)
    JobFinished {
        result: JobResult,
        processed: usize,
        total: usize,
    },

    /// Terminal notification
    Finished { summary: RunSummary, message: String },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub concurrency: usize,
    pub ordering: OrderingPolicy,
    /// Re-encode even if the output already exists
    pub overwrite: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            ordering: OrderingPolicy::default(),
            overwrite: true,
        }
    }
}

/// A discovered source paired with the output path reserved for it
#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub source: SourceFile,
    pub output: PathBuf,
}

/// Everything a finished run hands back
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// In completion order
    pub results: Vec<JobResult>,
}

pub struct Scheduler {
    probe: Arc<dyn MediaProbe>,
    encoder: Arc<dyn Encoder>,
    cascade: Cascade,
    layout: LayoutSettings,
    options: RunOptions,
    cancel: CancelToken,
    events: Option<Sender<RunEvent>>,
}

impl Scheduler {
    pub fn new(probe: Arc<dyn MediaProbe>, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            probe,
            encoder,
            cascade: Cascade::default(),
            layout: LayoutSettings::default(),
            options: RunOptions::default(),
            cancel: CancelToken::new(),
            events: None,
        }
    }

    pub fn with_cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn with_layout(mut self, layout: LayoutSettings) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Stream progress to `tx`. A dropped receiver is ignored.
    pub fn with_events(mut self, tx: Sender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle for requesting cancellation from outside the run
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    pub fn layout_for(&self, root: &Path) -> OutputLayout {
        self.layout.for_root(root)
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Discover eligible files under `root` and return them in dispatch order
    pub fn plan(&self, root: &Path) -> Result<Vec<SourceFile>, DiscoveryError> {
        let layout = self.layout.for_root(root);
        let mut sources = discover(root, &layout.excluded_dirs(), self.probe.as_ref())?;
        order_sources(&mut sources, self.options.ordering);
        Ok(sources)
    }

    /// [`Scheduler::plan`] plus a unique output path for every source
    pub fn plan_jobs(&self, root: &Path) -> Result<Vec<PlannedJob>, DiscoveryError> {
        let layout = self.layout.for_root(root);
        let sources = self.plan(root)?;
        let inputs: Vec<&Path> = sources.iter().map(|s| s.path.as_path()).collect();
        let outputs = layout.output_paths(&inputs);

        Ok(sources
            .into_iter()
            .zip(outputs)
            .map(|(source, output)| PlannedJob { source, output })
            .collect())
    }

    /// Run the whole batch.
    ///
    /// Only a discovery failure is returned as an error; every per-file problem becomes a
    /// failed [`JobResult`]. Once cancelled, no new job starts, but jobs already running
    /// finish and are counted.
    pub fn run(&self, root: &Path) -> Result<RunReport, DiscoveryError> {
        let started = Instant::now();
        let layout = self.layout.for_root(root);

        let jobs = self.plan_jobs(root)?;
        let total = jobs.len();
        info!("Found {} eligible files under {}", total, root.display());
        self.emit(RunEvent::Discovered { total });

        let mut summary = RunSummary::new(total);
        let mut results = Vec::with_capacity(total);

        if total > 0 {
            layout.prepare().map_err(|e| DiscoveryError::Layout {
                path: layout.output_dir.clone(),
                source: e,
            })?;

            let queue = Mutex::new(VecDeque::from(jobs));
            let workers = self.options.concurrency.clamp(1, total);
            let (tx, rx) = mpsc::channel::<(JobResult, u64)>();

            thread::scope(|scope| {
                for worker_id in 0..workers {
                    let tx = tx.clone();
                    let queue = &queue;
                    let layout = &layout;
                    scope.spawn(move || self.worker_loop(worker_id, queue, layout, tx));
                }
                drop(tx);

                for (result, source_bytes) in rx {
                    summary.record(&result, source_bytes);
                    let processed = summary.completed();
                    self.emit(RunEvent::JobFinished {
                        result: result.clone(),
                        processed,
                        total,
                    });
                    results.push(result);
                }
            });
        }

        // A signal that arrives after the last dispatch cancels nothing
        summary.cancelled = self.cancel.is_cancelled() && summary.not_started() > 0;
        summary.elapsed_secs = started.elapsed().as_secs_f64();

        let message = summary.message();
        info!("{}", message.replace('\n', " | "));
        self.emit(RunEvent::Finished {
            summary: summary.clone(),
            message,
        });

        Ok(RunReport { summary, results })
    }

    fn worker_loop(
        &self,
        worker_id: usize,
        queue: &Mutex<VecDeque<PlannedJob>>,
        layout: &OutputLayout,
        tx: Sender<(JobResult, u64)>,
    ) {
        loop {
            // Checked at dispatch only; a running encode is never interrupted
            if self.cancel.is_cancelled() {
                debug!("Worker {} stopping: run cancelled", worker_id);
                break;
            }

            let next = queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front();
            let Some(PlannedJob { mut source, output }) = next else {
                break;
            };

            self.emit(RunEvent::JobStarted {
                job_id: source.id,
                source: source.path.clone(),
                worker_id,
            });

            let result = self.process(&mut source, output, layout);
            if tx.send((result, source.size_bytes)).is_err() {
                break;
            }
        }
    }

    /// Encode one file. Never fails: problems become a failed or skipped result.
    fn process(
        &self,
        source: &mut SourceFile,
        output: PathBuf,
        layout: &OutputLayout,
    ) -> JobResult {
        if !self.options.overwrite && output.exists() {
            debug!("Skipping {}: output exists", source.path.display());
            return JobResult::skipped(source, "output already exists");
        }

        if let Some(parent) = output.parent() {
            if let Err(e) = ensure_dir(parent) {
                warn!("Failed to create {}: {}", parent.display(), e);
                return JobResult::failed(source, format!("{}: {}", parent.display(), e));
            }
        }

        let geometry = source.geometry_or_probe(|path| self.probe.probe_geometry(path));
        let plan = select_params(geometry.width, geometry.frame_rate);
        let request = EncodeRequest {
            source: source.path.clone(),
            output: output.clone(),
            log: layout.log_path(&source.path, source.id),
            plan,
        };

        debug!(
            "Encoding {} ({}x{} @ {:.2}fps) at {} / crf {}",
            source.path.display(),
            geometry.width,
            geometry.height,
            geometry.frame_rate,
            plan.bitrate_arg(),
            plan.quality_factor
        );

        match self.cascade.encode(self.encoder.as_ref(), &request) {
            CascadeOutcome::Encoded { attempt, tried } => {
                info!(
                    "Encoded {} with {} (attempt {}/{})",
                    source.file_name(),
                    attempt,
                    tried,
                    self.cascade.len()
                );
                JobResult::succeeded(source, attempt, output)
            }
            CascadeOutcome::Exhausted { tried, last_error } => {
                let error = last_error.unwrap_or_else(|| "no attempt succeeded".to_string());
                warn!(
                    "Failed {} after {} attempts: {}",
                    source.file_name(),
                    tried,
                    error
                );
                JobResult::failed(source, error)
            }
        }
    }
}
