//! Scheduler background worker.
//!
//! Runs an evaluation pass over every job on a periodic interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use convoy_id::EvalId;
use convoy_reconcile::{NodeTable, Reconciler, Snapshot};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::applier::{ApplyResult, PlanApplier};
use crate::config::Config;
use crate::state::StateStore;

/// Worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub interval: Duration,
    /// Evaluations allowed to run at once.
    pub max_concurrent_evals: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_concurrent_evals: 8,
        }
    }
}

impl From<&Config> for WorkerConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.eval_interval,
            max_concurrent_evals: config.max_concurrent_evals,
        }
    }
}

/// Statistics from one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalStats {
    pub jobs_evaluated: usize,
    pub plans_applied: usize,
    pub plans_stale: usize,
    pub plans_failed: usize,
    pub placed: usize,
    pub stopped: usize,
    pub migrated: usize,
    pub unplaced: usize,
}

impl EvalStats {
    fn record(&mut self, outcome: EvalOutcome) {
        self.jobs_evaluated += 1;
        match outcome {
            EvalOutcome::Noop => {}
            EvalOutcome::Applied(result) => {
                self.plans_applied += 1;
                self.placed += result.created.len() - result.migrated;
                self.stopped += result.stopped;
                self.migrated += result.migrated;
                self.unplaced += result.unplaced;
            }
            EvalOutcome::Stale => self.plans_stale += 1,
            EvalOutcome::Failed => self.plans_failed += 1,
        }
    }

    /// Returns true if the pass changed or tried to change anything.
    pub fn is_active(&self) -> bool {
        self.plans_applied + self.plans_stale + self.plans_failed > 0
    }
}

enum EvalOutcome {
    Noop,
    Applied(ApplyResult),
    Stale,
    Failed,
}

/// Scheduler worker that evaluates jobs on an interval.
pub struct SchedulerWorker {
    store: StateStore,
    applier: Arc<dyn PlanApplier>,
    config: WorkerConfig,
}

impl SchedulerWorker {
    pub fn new(store: StateStore, applier: Arc<dyn PlanApplier>, config: WorkerConfig) -> Self {
        Self {
            store,
            applier,
            config,
        }
    }

    /// Run the worker until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_concurrent_evals = self.config.max_concurrent_evals,
            "Starting scheduler worker"
        );

        let mut interval = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Scheduler worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single evaluation pass over every job in the current state.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> EvalStats {
        let snapshot = Arc::new(self.store.snapshot().await);
        let nodes = Arc::new(snapshot.node_table());
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_evals.max(1)));

        let mut tasks = JoinSet::new();
        for job_id in snapshot.job_ids() {
            let job_id = job_id.to_string();
            let snapshot = Arc::clone(&snapshot);
            let nodes = Arc::clone(&nodes);
            let permits = Arc::clone(&permits);
            let applier = Arc::clone(&self.applier);

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return EvalOutcome::Failed;
                };
                evaluate(&snapshot, &nodes, &job_id, EvalId::new(), applier.as_ref()).await
            });
        }

        let mut stats = EvalStats::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    error!(error = %e, "Evaluation task panicked");
                    stats.jobs_evaluated += 1;
                    stats.plans_failed += 1;
                }
            }
        }

        if stats.is_active() {
            info!(
                index = %snapshot.index,
                jobs_evaluated = stats.jobs_evaluated,
                plans_applied = stats.plans_applied,
                plans_stale = stats.plans_stale,
                plans_failed = stats.plans_failed,
                placed = stats.placed,
                stopped = stats.stopped,
                migrated = stats.migrated,
                unplaced = stats.unplaced,
                "Evaluation pass complete"
            );
        } else {
            debug!(
                index = %snapshot.index,
                jobs_evaluated = stats.jobs_evaluated,
                "Evaluation pass complete, nothing to do"
            );
        }

        stats
    }
}

#[instrument(skip_all, fields(job_id = %job_id, eval_id = %eval_id))]
async fn evaluate(
    snapshot: &Snapshot,
    nodes: &NodeTable,
    job_id: &str,
    eval_id: EvalId,
    applier: &dyn PlanApplier,
) -> EvalOutcome {
    let plan = Reconciler::from_snapshot(snapshot, job_id, nodes)
        .compute()
        .stamped(eval_id, Utc::now());
    if plan.is_empty() {
        return EvalOutcome::Noop;
    }

    let totals = plan.totals();
    debug!(
        place = totals.place,
        stop = totals.stop,
        migrate = totals.migrate,
        "Submitting plan"
    );

    match applier.apply(&plan).await {
        Ok(result) => EvalOutcome::Applied(result),
        Err(e) if e.is_stale() => {
            info!(error = %e, "Plan rejected, job will be evaluated again");
            EvalOutcome::Stale
        }
        Err(e) => {
            warn!(error = %e, "Failed to apply plan");
            EvalOutcome::Failed
        }
    }
}
