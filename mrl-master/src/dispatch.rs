use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::availability::{AvailabilityPool, PoolSender};
use crate::job_queue::{JobQueue, JobRequeue};
use crate::jobs::{JobIndex, Phase};
use crate::transport::WorkerTransport;
use crate::worker_info::WorkerAddress;
use crate::worker_registry::RegistryHandle;

/// Everything a dispatch task needs besides its job and worker.
pub struct DispatchContext<T> {
    pub transport: Arc<T>,
    pub registry: RegistryHandle,
    pub pool: PoolSender,
    pub requeue: JobRequeue,
}

impl<T> Clone for DispatchContext<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            pool: self.pool.clone(),
            requeue: self.requeue.clone(),
        }
    }
}

/// One in-flight `DoJob` call.
pub struct DispatchTask<T> {
    ctx: DispatchContext<T>,
    phase: Phase,
    job: JobIndex,
    address: WorkerAddress,
}

impl<T: WorkerTransport> DispatchTask<T> {
    pub fn new(ctx: DispatchContext<T>, phase: Phase, job: JobIndex, address: WorkerAddress) -> Self {
        Self {
            ctx,
            phase,
            job,
            address,
        }
    }

    /// Run the job on the worker.
    ///
    /// `captured` fires once the task holds its own arguments and worker
    /// address. Exactly one of requeue + mark offline or return-to-pool
    /// happens afterwards.
    pub async fn run(self, captured: oneshot::Sender<()>) {
        let DispatchTask {
            ctx,
            phase,
            job,
            address,
        } = self;
        let args = phase.job(job);
        let operation = args.operation;
        let _ = captured.send(());

        debug!(%address, %operation, job, "starting job on worker");
        let succeeded = match ctx.transport.do_job(&address, args).await {
            Ok(reply) if reply.ok => true,
            Ok(_) => {
                warn!(%address, %operation, job, "worker reported job failure");
                false
            }
            Err(e) => {
                warn!(%address, %operation, job, error = %e, "job RPC failed");
                false
            }
        };

        if succeeded {
            debug!(%address, %operation, job, "job done");
            ctx.pool.release(address);
        } else {
            // The job goes back before the worker is marked offline: the
            // barrier cannot close until the registry has seen the latter,
            // so the requeued job is visible by then.
            ctx.requeue.push(job);
            ctx.registry.mark_offline(address);
        }
    }
}

/// Hand every pending job of `phase` to a free worker.
///
/// Returns once the queue is empty. Jobs may still be running, and failed
/// ones may be requeued after this returns.
pub async fn dispatch_pending<T: WorkerTransport>(
    phase: &Phase,
    queue: &mut JobQueue,
    pool: &mut AvailabilityPool,
    ctx: &DispatchContext<T>,
) {
    while let Some(job) = queue.pop() {
        if ctx.registry.online_count() == 0 {
            info!("no workers are online, waiting for one to register");
        }

        let address = pool.acquire().await;
        debug!(%address, job, operation = %phase.operation, "dispatching");

        let (captured_tx, captured_rx) = oneshot::channel();
        let task = DispatchTask::new(ctx.clone(), phase.clone(), job, address);
        tokio::spawn(task.run(captured_tx));

        // Wait for the task to take its copy before picking the next job.
        let _ = captured_rx.await;
    }
}
