mod pool;
mod scope;

use crate::classifier::classify;
use crate::config::Config;
use crate::fetcher::{FetchError, Fetcher};
use crate::store::{ProfileSink, SavedProfile, SubmissionRequest, SubmitError};
use crate::target::Target;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use pool::{PoolReport, WorkerPool};
pub use scope::{ScopeError, TargetScope};

/// How long a cancelled run waits for abandoned blocking requests on shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// How a collection run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// No targets were given; no worker was started.
    NothingToProfile,
    /// Every dispatched target went through the pipeline. Per-profile results
    /// were logged as they happened.
    Completed {
        dispatched: usize,
        processed: usize,
        cancelled: bool,
    },
}

/// Result of running the pipeline for one target.
#[derive(Debug)]
pub enum TargetOutcome {
    FetchFailed(FetchError),
    Processed {
        stored: Vec<SavedProfile>,
        unknown: Vec<String>,
        failed: Vec<(String, SubmitError)>,
    },
}

struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn ProfileSink>,
    target_timeout: Duration,
}

impl Pipeline {
    async fn process(&self, base: &CancellationToken, target: Target) -> TargetOutcome {
        let scope = TargetScope::new(base, self.target_timeout);
        let outcome = self.collect(&scope, &target).await;
        drop(scope);

        match &outcome {
            TargetOutcome::FetchFailed(_) => {}
            TargetOutcome::Processed {
                stored,
                unknown,
                failed,
            } => log::debug!(
                "[{}] done: {} stored, {} unknown, {} failed",
                target.id,
                stored.len(),
                unknown.len(),
                failed.len()
            ),
        }

        outcome
    }

    async fn collect(&self, scope: &TargetScope, target: &Target) -> TargetOutcome {
        let fetched = scope
            .bound(self.fetcher.fetch(scope, target))
            .await
            .map_err(FetchError::from)
            .and_then(|fetched| fetched);

        let profiles = match fetched {
            Ok(profiles) => profiles,
            Err(e) => {
                log::error!("[{}] impossible to gather profiles: {}", target.id, e);
                return TargetOutcome::FetchFailed(e);
            }
        };

        if profiles.is_empty() {
            log::warn!("[{}] no profiles gathered", target.id);
        }

        let mut stored = Vec::with_capacity(profiles.len());
        let mut unknown = Vec::new();
        let mut failed = Vec::new();

        for (kind, profile) in profiles {
            let canonical = classify(&kind);
            if !canonical.is_known() {
                log::warn!(
                    "[{}] unknown profile type {:?}, it can not be sent to the store. Skip this profile",
                    target.id,
                    kind
                );
                unknown.push(kind);
                continue;
            }

            let submitted = match SubmissionRequest::for_target(target, canonical, profile.payload)
            {
                Ok(request) => scope
                    .bound(self.sink.submit(scope, request))
                    .await
                    .map_err(SubmitError::from)
                    .and_then(|saved| saved),
                Err(e) => Err(e),
            };

            match submitted {
                Ok(saved) => {
                    log::info!(
                        "[{}] profile stored. id={} type={} url={}",
                        target.id,
                        saved.id,
                        saved.kind,
                        saved.url
                    );
                    stored.push(saved);
                }
                Err(e) => {
                    log::warn!("[{}] failed to store {} profile: {}", target.id, kind, e);
                    failed.push((kind, e));
                }
            }
        }

        TargetOutcome::Processed {
            stored,
            unknown,
            failed,
        }
    }
}

/// Runs the fetch, classify and submit pipeline over a set of targets with a
/// bounded number of workers.
pub struct Collector {
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
}

impl Collector {
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn ProfileSink>) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                fetcher,
                sink,
                target_timeout: config.target_timeout,
            }),
            pool: WorkerPool::new(config.workers),
        }
    }

    /// Collects from every target and returns once all workers have exited.
    ///
    /// Cancelling `cancel` stops dispatching, aborts in-flight targets and
    /// unwinds the workers.
    pub async fn run(&self, targets: Vec<Target>, cancel: CancellationToken) -> RunStatus {
        if targets.is_empty() {
            log::warn!("No targets to profile");
            return RunStatus::NothingToProfile;
        }

        log::info!(
            "Starting to profile {} targets with {} workers",
            targets.len(),
            self.pool.size()
        );

        let pipeline = Arc::clone(&self.pipeline);
        let base = cancel.clone();
        let report = self
            .pool
            .run(targets, &cancel, move |worker, target| {
                let pipeline = Arc::clone(&pipeline);
                let base = base.clone();
                async move {
                    log::debug!("worker {}: profiling {}", worker, target.id);
                    pipeline.process(&base, target).await;
                }
            })
            .await;

        RunStatus::Completed {
            dispatched: report.dispatched,
            processed: report.processed,
            cancelled: report.cancelled,
        }
    }

    /// Runs the pipeline for a single target outside the pool.
    pub async fn process_target(&self, cancel: &CancellationToken, target: Target) -> TargetOutcome {
        self.pipeline.process(cancel, target).await
    }
}

/// Shuts down the runtime a run was driven on.
///
/// Requests abandoned by a cancelled run keep a blocking thread until their
/// own timeout fires, so they get at most [`SHUTDOWN_GRACE`] before being
/// left behind. Otherwise the runtime is dropped normally.
pub fn shutdown(runtime: tokio::runtime::Runtime, status: &RunStatus) {
    match status {
        RunStatus::Completed {
            cancelled: true, ..
        } => {
            log::debug!("Dropping in-flight requests of the cancelled run");
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
        _ => drop(runtime),
    }
}
