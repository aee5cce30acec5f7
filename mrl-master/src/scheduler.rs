use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::availability::AvailabilityPool;
use crate::barrier::wait_for_idle_workers;
use crate::dispatch::{dispatch_pending, DispatchContext};
use crate::job_queue::JobQueue;
use crate::jobs::{Phase, SchedulerConfig};
use crate::transport::WorkerTransport;
use crate::worker_info::WorkerAddress;
use crate::worker_registry::{RegistryHandle, WorkerRegistry};

/// Where a run is. Moves strictly forward; no state is entered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    MapPhase,
    ReducePhase,
    ShuttingDown,
    Done,
}

/// Jobs completed by each worker that acknowledged shutdown, ordered by
/// worker address.
pub type ShutdownRecord = Vec<u32>;

/// Runs the map phase, then the reduce phase, then shuts the workers down.
pub struct MasterScheduler<T> {
    config: SchedulerConfig,
    transport: Arc<T>,
    registry: RegistryHandle,
    pool: AvailabilityPool,
    state: watch::Sender<SchedulerState>,
}

impl<T: WorkerTransport> MasterScheduler<T> {
    /// Build a scheduler and start its worker registry, which listens on
    /// `registrations` right away. Workers registering before [`run`] is
    /// called are available to the first phase.
    ///
    /// [`run`]: MasterScheduler::run
    pub fn new(
        config: SchedulerConfig,
        transport: Arc<T>,
        registrations: mpsc::UnboundedReceiver<WorkerAddress>,
    ) -> Self {
        let pool = AvailabilityPool::new();
        let registry = WorkerRegistry::new(pool.sender()).spawn(registrations);
        let (state, _) = watch::channel(SchedulerState::Idle);

        Self {
            config,
            transport,
            registry,
            pool,
            state,
        }
    }

    /// Receiver following the scheduler's state.
    pub fn state_watch(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SchedulerState) {
        info!(?state, "scheduler state");
        self.state.send_replace(state);
    }

    /// Run both phases and the shutdown sweep.
    pub async fn run(mut self) -> ShutdownRecord {
        self.set_state(SchedulerState::MapPhase);
        let map = self.config.map_phase();
        self.run_phase(&map).await;

        self.set_state(SchedulerState::ReducePhase);
        let reduce = self.config.reduce_phase();
        self.run_phase(&reduce).await;

        self.set_state(SchedulerState::ShuttingDown);
        let record = self.kill_workers().await;

        self.set_state(SchedulerState::Done);
        record
    }

    /// Start a run in the background. The returned handle reports the
    /// state and delivers the shutdown record once.
    pub fn spawn(
        config: SchedulerConfig,
        transport: Arc<T>,
        registrations: mpsc::UnboundedReceiver<WorkerAddress>,
    ) -> MasterHandle {
        let scheduler = Self::new(config, transport, registrations);
        let state = scheduler.state_watch();
        let (done_tx, done) = oneshot::channel();

        tokio::spawn(async move {
            let record = scheduler.run().await;
            let _ = done_tx.send(record);
        });

        MasterHandle { state, done }
    }

    /// Dispatch every job of `phase` and return once all of them have
    /// completed.
    async fn run_phase(&mut self, phase: &Phase) {
        info!(
            operation = %phase.operation,
            jobs = phase.num_jobs,
            other = phase.num_other_phase,
            "phase started"
        );

        let mut queue = JobQueue::new(phase.num_jobs);
        let ctx = DispatchContext {
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            pool: self.pool.sender(),
            requeue: queue.requeue_handle(),
        };

        loop {
            dispatch_pending(phase, &mut queue, &mut self.pool, &ctx).await;

            debug!(operation = %phase.operation, "queue drained, waiting for workers to finish");
            let drained = wait_for_idle_workers(&mut self.pool, &self.registry).await;

            // A job that failed while we waited is back in the queue.
            if queue.is_empty() {
                info!(operation = %phase.operation, workers = drained, "phase done");
                return;
            }
            info!(
                operation = %phase.operation,
                pending = queue.len(),
                "jobs failed near the end of the phase, dispatching again"
            );
        }
    }

    /// Send `Shutdown` to every worker ever registered and collect how many
    /// jobs each one did. Workers that cannot be reached are skipped.
    async fn kill_workers(&self) -> ShutdownRecord {
        let mut addresses: Vec<_> = self.registry.snapshot().await.into_keys().collect();
        addresses.sort();

        let mut record = Vec::with_capacity(addresses.len());
        for address in addresses {
            debug!(%address, "shutting down worker");
            match self.transport.shutdown(&address).await {
                Ok(reply) => {
                    info!(%address, n_jobs = reply.n_jobs, "worker shut down");
                    record.push(reply.n_jobs);
                }
                Err(e) => warn!(%address, error = %e, "shutdown RPC failed"),
            }
        }

        record
    }
}

/// The caller's side of a running scheduler.
#[derive(Debug)]
pub struct MasterHandle {
    state: watch::Receiver<SchedulerState>,
    done: oneshot::Receiver<ShutdownRecord>,
}

impl MasterHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Wait for the run to finish and take its shutdown record.
    ///
    /// Never returns if no worker ever registers.
    pub async fn wait(self) -> anyhow::Result<ShutdownRecord> {
        self.done
            .await
            .map_err(|_| anyhow!("scheduler stopped without completing"))
    }
}
