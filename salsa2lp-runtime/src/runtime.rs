use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use salsa2lp_core::cancel::CancelFlag;
use salsa2lp_core::types::PackageRef;
use salsa2lp_sync::pipeline::log_result;
use salsa2lp_sync::{BatchReport, PackageReport, SyncEngine};

use crate::error::{io_err, RuntimeError};

/// Batch execution knobs.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Concurrent package attempts; 0 is treated as 1.
    pub jobs: usize,
    /// Raise the cancel flag on ctrl-c.
    pub handle_interrupt: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            handle_interrupt: true,
        }
    }
}

type Queue = Arc<Mutex<VecDeque<(usize, PackageRef)>>>;

/// Build a multi-threaded tokio runtime and drive [`run`] to completion.
pub fn start_blocking(
    engine: Arc<SyncEngine>,
    packages: Vec<PackageRef>,
    options: RunOptions,
    cancel: CancelFlag,
) -> Result<BatchReport, RuntimeError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(engine, packages, options, cancel))
}

/// Process `packages` on up to `options.jobs` workers.
///
/// Each attempt runs on a blocking task. Workers pull from a shared queue
/// and stop taking work once `cancel` is raised; packages never taken are
/// listed in [`BatchReport::not_started`]. Reports keep input order.
pub async fn run(
    engine: Arc<SyncEngine>,
    packages: Vec<PackageRef>,
    options: RunOptions,
    cancel: CancelFlag,
) -> Result<BatchReport, RuntimeError> {
    let total = packages.len();
    let jobs = options.jobs.clamp(1, total.max(1));
    tracing::info!("syncing {total} package(s) with {jobs} worker(s)");

    let queue: Queue = Arc::new(Mutex::new(packages.iter().cloned().enumerate().collect()));
    let (report_tx, mut report_rx) = mpsc::unbounded_channel::<(usize, PackageReport)>();

    let signal_handle = options
        .handle_interrupt
        .then(|| spawn_interrupt_handler(cancel.clone()));

    let workers: Vec<JoinHandle<Result<(), RuntimeError>>> = (0..jobs)
        .map(|worker| {
            tokio::spawn(worker_task(
                worker,
                Arc::clone(&engine),
                Arc::clone(&queue),
                report_tx.clone(),
                cancel.clone(),
            ))
        })
        .collect();
    drop(report_tx);

    let mut slots: Vec<Option<PackageReport>> = (0..total).map(|_| None).collect();
    while let Some((idx, report)) = report_rx.recv().await {
        slots[idx] = Some(report);
    }

    for handle in workers {
        handle_join("worker", handle.await)?;
    }
    if let Some(handle) = signal_handle {
        handle.abort();
    }

    let mut report = BatchReport::default();
    for (slot, package) in slots.into_iter().zip(packages) {
        match slot {
            Some(done) => report.reports.push(done),
            None => report.not_started.push(package),
        }
    }
    report.interrupted = cancel.is_cancelled();
    Ok(report)
}

async fn worker_task(
    worker: usize,
    engine: Arc<SyncEngine>,
    queue: Queue,
    reports: mpsc::UnboundedSender<(usize, PackageReport)>,
    cancel: CancelFlag,
) -> Result<(), RuntimeError> {
    loop {
        if cancel.is_cancelled() {
            tracing::debug!("worker {worker}: cancelled, taking no more work");
            break;
        }
        let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        let Some((idx, package)) = next else { break };

        let engine = Arc::clone(&engine);
        let flag = cancel.clone();
        let result = tokio::task::spawn_blocking(move || {
            let result = engine.sync_package(&package, &flag);
            log_result(&package, &result);
            PackageReport { package, result }
        })
        .await
        .map_err(|err| RuntimeError::Join {
            task: "package",
            message: err.to_string(),
        })?;

        if reports.send((idx, result)).is_err() {
            break;
        }
    }
    Ok(())
}

fn spawn_interrupt_handler(cancel: CancelFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("interrupted; finishing in-flight packages and stopping");
                cancel.cancel();
            }
            Err(err) => tracing::error!("ctrl-c handler failed: {err}"),
        }
    })
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), RuntimeError>, tokio::task::JoinError>,
) -> Result<(), RuntimeError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(RuntimeError::Join {
            task,
            message: err.to_string(),
        }),
    }
}

/// Install the global subscriber. `RUST_LOG` wins; otherwise `info` with
/// `verbose`, `warn` without. Records from the `log` facade are bridged.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
