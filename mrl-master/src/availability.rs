use tokio::sync::mpsc;
use tracing::debug;

use crate::worker_info::WorkerAddress;

/// Addresses of workers currently free to accept a job.
///
/// The scheduler owns the receiving end. Registrations, successful dispatch
/// tasks and end-of-phase re-seeding put addresses in through a
/// [`PoolSender`].
#[derive(Debug)]
pub struct AvailabilityPool {
    free: mpsc::UnboundedReceiver<WorkerAddress>,
    sender: PoolSender,
}

impl Default for AvailabilityPool {
    fn default() -> Self {
        let (tx, free) = mpsc::unbounded_channel();
        Self {
            free,
            sender: PoolSender(tx),
        }
    }
}

impl AvailabilityPool {
    pub fn new() -> Self {
        AvailabilityPool::default()
    }

    pub fn sender(&self) -> PoolSender {
        self.sender.clone()
    }

    /// Wait for a free worker. Blocks for as long as nobody is free,
    /// including forever when no worker ever registers.
    pub async fn acquire(&mut self) -> WorkerAddress {
        match self.free.recv().await {
            Some(address) => address,
            // `self.sender` keeps the channel open.
            None => std::future::pending().await,
        }
    }

    /// Take a free worker if one is immediately available.
    #[cfg(test)]
    pub(crate) fn try_acquire(&mut self) -> Option<WorkerAddress> {
        self.free.try_recv().ok()
    }
}

/// Returns workers to an [`AvailabilityPool`].
#[derive(Debug, Clone)]
pub struct PoolSender(mpsc::UnboundedSender<WorkerAddress>);

impl PoolSender {
    pub fn release(&self, address: WorkerAddress) {
        if let Err(e) = self.0.send(address) {
            debug!(address = %e.0, "pool is gone, worker not returned");
        }
    }

    /// Put `addresses` back from a background task, so the caller never
    /// waits on the pool.
    pub fn reseed(&self, addresses: Vec<WorkerAddress>) {
        let pool = self.clone();
        tokio::spawn(async move {
            for address in addresses {
                pool.release(address);
            }
        });
    }
}
