//! Worker pool and lifecycle.
//!
//! [`Controller::run`] waits for the change source to sync, starts a fixed
//! number of worker threads, and blocks until the [`StopSignal`] fires.
//! Each worker pulls keys from the rate-limited queue and hands them to the
//! [`ConfigReconciler`]. The queue guarantees that a key is held by at most
//! one worker at a time.

use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};
use crate::notifier::{ChangeSource, EnqueueHandler};
use crate::reconciler::{ConfigReconciler, SyncOutcome};
use crate::resource::ConfigSpec;
use crate::shutdown::StopSignal;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use steady_queue::RateLimitingQueue;
use tracing::{debug, error, info, warn};

/// Reconciles a single configuration object with a pool of workers.
pub struct Controller<S: ConfigSpec> {
    worker: Worker<S>,
    source: Arc<dyn ChangeSource<S>>,
    config: ControllerConfig,
}

/// The state each worker thread shares.
struct Worker<S> {
    reconciler: Arc<ConfigReconciler<S>>,
    queue: Arc<RateLimitingQueue<String>>,
}

impl<S> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self {
            reconciler: Arc::clone(&self.reconciler),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<S: ConfigSpec> Controller<S> {
    /// Builds the queue from `config` and subscribes to `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid, names a different target
    /// than `reconciler`, or the queue's timer thread cannot be started.
    pub fn new(
        config: ControllerConfig,
        reconciler: ConfigReconciler<S>,
        source: Arc<dyn ChangeSource<S>>,
    ) -> ControllerResult<Self> {
        config.validate()?;
        if config.target_name.as_deref() != reconciler.target_name() {
            return Err(ControllerError::InvalidConfig(format!(
                "config targets {:?} but reconciler targets {:?}",
                config.target_name,
                reconciler.target_name()
            )));
        }
        let limiter = config.rate_limit.build::<String>()?;
        let queue = Arc::new(RateLimitingQueue::new(
            config.queue_name.clone(),
            Arc::new(limiter),
        )?);

        info!(queue = %config.queue_name, "setting up event handlers");
        source.add_event_handler(Arc::new(EnqueueHandler::new(Arc::clone(&queue))));

        Ok(Self {
            worker: Worker {
                reconciler: Arc::new(reconciler),
                queue,
            },
            source,
            config,
        })
    }

    /// Runs `workers` worker threads until `stop` fires, then shuts the
    /// queue down and waits for in-flight items to finish.
    ///
    /// The queue is shut down on every return path, so a controller runs at
    /// most once.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::CacheSyncFailed`] if the change source did
    /// not sync before `stop` fired or the configured timeout elapsed,
    /// [`ControllerError::InvalidConfig`] if `workers` is zero, and
    /// [`ControllerError::Io`] if a worker thread could not be spawned.
    pub fn run(&self, workers: usize, stop: &StopSignal) -> ControllerResult<()> {
        let result = self.run_workers(workers, stop);
        self.worker.queue.shut_down();
        if let Err(err) = &result {
            error!(error = %err, "controller stopped with error");
        }
        result
    }

    /// Runs [`ControllerConfig::workers`] worker threads until `stop` fires.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run).
    pub fn serve(&self, stop: &StopSignal) -> ControllerResult<()> {
        self.run(self.config.workers, stop)
    }

    /// Processes one queued key on the calling thread. Blocks until a key
    /// is available; returns false once the queue has shut down.
    pub fn process_next_item(&self) -> bool {
        self.worker.process_next_item()
    }

    /// Returns the work queue.
    pub fn queue(&self) -> &Arc<RateLimitingQueue<String>> {
        &self.worker.queue
    }

    /// Returns the reconciler.
    pub fn reconciler(&self) -> &Arc<ConfigReconciler<S>> {
        &self.worker.reconciler
    }

    /// Returns the settings.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn run_workers(&self, workers: usize, stop: &StopSignal) -> ControllerResult<()> {
        if workers == 0 {
            return Err(ControllerError::InvalidConfig(
                "workers must be at least 1".into(),
            ));
        }

        info!(queue = %self.config.queue_name, workers, "starting config controller");
        info!("waiting for caches to sync");
        self.wait_for_cache_sync(stop)?;

        info!("starting workers");
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = self.worker.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{id}", self.config.queue_name))
                .spawn(move || worker.run(id));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    self.worker.queue.shut_down();
                    join_all(handles);
                    return Err(err.into());
                }
            }
        }
        info!("started workers");

        stop.wait();
        info!("shutting down workers");
        self.worker.queue.shut_down();
        join_all(handles);
        info!("workers stopped");
        Ok(())
    }

    fn wait_for_cache_sync(&self, stop: &StopSignal) -> ControllerResult<()> {
        let started = Instant::now();
        loop {
            if self.source.has_synced() {
                info!(elapsed = ?started.elapsed(), "caches synced");
                return Ok(());
            }
            if let Some(timeout) = self.config.cache_sync_timeout {
                if started.elapsed() >= timeout {
                    return Err(ControllerError::cache_sync_failed(format!(
                        "timed out after {timeout:?}"
                    )));
                }
            }
            if stop.wait_timeout(self.config.cache_sync_poll_interval) {
                return Err(ControllerError::cache_sync_failed(
                    "stopped before caches synced",
                ));
            }
        }
    }
}

impl<S: ConfigSpec> Worker<S> {
    fn run(&self, id: usize) {
        debug!(worker = id, "worker started");
        while self.process_next_item() {}
        debug!(worker = id, "worker exiting");
    }

    fn process_next_item(&self) -> bool {
        let Some(key) = self.queue.get() else {
            return false;
        };

        match self.sync(&key) {
            Ok(outcome) => {
                self.queue.forget(&key);
                if outcome != SyncOutcome::Ignored {
                    debug!(%key, ?outcome, "synced");
                }
            }
            Err(err) if err.is_retryable() => {
                self.queue.add_rate_limited(key.clone());
                error!(
                    %key,
                    requeues = self.queue.num_requeues(&key),
                    error = %err,
                    "error syncing, requeuing"
                );
            }
            Err(err) => {
                self.queue.forget(&key);
                warn!(%key, error = %err, "dropping item after permanent error");
            }
        }

        self.queue.done(&key);
        true
    }

    fn sync(&self, key: &str) -> ControllerResult<SyncOutcome> {
        panic::catch_unwind(AssertUnwindSafe(|| self.reconciler.sync(key))).unwrap_or_else(
            |payload| {
                Err(ControllerError::Panicked {
                    key: key.to_string(),
                    message: panic_message(payload.as_ref()),
                })
            },
        )
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            error!("worker thread panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<S: ConfigSpec> std::fmt::Debug for Controller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("queue", &self.worker.queue)
            .finish_non_exhaustive()
    }
}
