//! Run command implementation.
//!
//! Seeds an in-memory store with the target policy, starts the controller
//! on a background thread and, while it runs, optionally edits or deletes
//! the stored policy to show the controller converging.

use super::policy::{LoggingDependent, SecurityPolicy};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use steady_core::{
    ConfigClient, ConfigLister, ConfigReconciler, ConfigResource, Controller, ControllerConfig,
    Dependent, MemoryConfigStore, Propagator, StopSignal,
};
use steady_queue::QueueStatsSnapshot;
use tracing::{info, warn};

/// Target used when neither the config file nor the command line names one.
pub const DEFAULT_TARGET: &str = "global";

/// How long to wait for outstanding work after the run window closes.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Options for the run command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Controller config file.
    pub config: Option<PathBuf>,
    /// Overrides the target name.
    pub target: Option<String>,
    /// Overrides the worker count.
    pub workers: Option<usize>,
    /// How long to run.
    pub duration: Duration,
    /// Interval between edits to the stored policy.
    pub drift_every: Option<Duration>,
    /// Delay before deleting the stored policy.
    pub delete_after: Option<Duration>,
}

/// What happened during a run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Reconciled object name.
    pub target: String,
    /// Worker threads used.
    pub workers: usize,
    /// Edits made to the stored policy.
    pub drifts: usize,
    /// Whether the stored policy was deleted.
    pub deleted: bool,
    /// Configuration applied by the controller when it stopped.
    pub desired: ConfigResource<SecurityPolicy>,
    /// Configuration in the store when the controller stopped.
    pub stored: Option<ConfigResource<SecurityPolicy>>,
    /// Configurations applied, per dependent.
    pub dependent_updates: Vec<(String, usize)>,
    /// Work queue counters.
    pub queue: QueueStatsSnapshot,
}

/// Runs the run command.
pub fn run(options: &RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let summary = simulate(options)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Runs the controller and returns the summary.
pub fn simulate(options: &RunOptions) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let config = resolve_config(options)?;
    let target = config
        .target_name
        .clone()
        .unwrap_or_else(|| DEFAULT_TARGET.to_string());
    let workers = config.workers;

    let store = Arc::new(MemoryConfigStore::<SecurityPolicy>::unsynced());
    let initial = ConfigResource::new(target.clone(), SecurityPolicy::baseline());
    store.create(&initial)?;
    store.mark_synced();

    let dependents = vec![
        Arc::new(LoggingDependent::new("pod-mutator")),
        Arc::new(LoggingDependent::new("network-policy")),
    ];
    let propagator = Propagator::new(
        dependents
            .iter()
            .map(|d| Arc::clone(d) as Arc<dyn Dependent<SecurityPolicy>>)
            .collect(),
    );
    let reconciler = ConfigReconciler::new(
        Some(target.clone()),
        initial,
        store.clone(),
        store.clone(),
        propagator,
    );
    let controller = Arc::new(Controller::new(config, reconciler, store.clone())?);

    let stop = StopSignal::new();
    let runner = {
        let controller = Arc::clone(&controller);
        let stop = stop.clone();
        thread::Builder::new()
            .name("steady-controller".into())
            .spawn(move || controller.serve(&stop))?
    };

    let (drifts, deleted) = drive(&store, &target, options);
    settle(&controller);

    stop.trigger();
    runner.join().map_err(|_| "controller thread panicked")??;
    info!(drifts, deleted, "run finished");

    Ok(RunSummary {
        target: target.clone(),
        workers,
        drifts,
        deleted,
        desired: (*controller.reconciler().desired()).clone(),
        stored: store.get(&target).ok(),
        dependent_updates: dependents
            .iter()
            .map(|d| (d.name().to_string(), d.updates()))
            .collect(),
        queue: controller.queue().stats().snapshot(),
    })
}

fn resolve_config(options: &RunOptions) -> Result<ControllerConfig, Box<dyn std::error::Error>> {
    let mut config = match &options.config {
        Some(path) => ControllerConfig::from_json_file(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(target) = &options.target {
        config.target_name = Some(target.clone());
    }
    if config.target_name.is_none() {
        config.target_name = Some(DEFAULT_TARGET.to_string());
    }
    if let Some(workers) = options.workers {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

/// Edits the store on schedule until the run window closes.
fn drive(
    store: &MemoryConfigStore<SecurityPolicy>,
    target: &str,
    options: &RunOptions,
) -> (usize, bool) {
    let start = Instant::now();
    let mut next_drift = options.drift_every.map(|every| start + every);
    let mut delete_at = options.delete_after.map(|after| start + after);
    let mut drifts = 0;
    let mut deleted = false;

    loop {
        let now = Instant::now();
        if now >= start + options.duration {
            return (drifts, deleted);
        }

        if delete_at.is_some_and(|at| now >= at) {
            delete_at = None;
            match store.delete(target) {
                Ok(_) => deleted = true,
                Err(err) => warn!(error = %err, "delete skipped"),
            }
        }

        if let (Some(at), Some(every)) = (next_drift, options.drift_every) {
            if now >= at {
                next_drift = Some(at + every);
                match store.get(target) {
                    Ok(mut current) => {
                        current.spec = current.spec.toggled();
                        if store.update(&current).is_ok() {
                            drifts += 1;
                        }
                    }
                    Err(err) => warn!(error = %err, "drift skipped"),
                }
            }
        }

        let wake = [Some(start + options.duration), next_drift, delete_at]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(now);
        thread::sleep(wake.saturating_duration_since(Instant::now()));
    }
}

/// Waits briefly for queued, delayed and in-flight keys to drain.
fn settle(controller: &Controller<SecurityPolicy>) {
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    let queue = controller.queue();
    while Instant::now() < deadline {
        if queue.is_empty() && queue.waiting() == 0 && queue.in_flight() == 0 {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    warn!("controller still busy when the run window closed");
}
