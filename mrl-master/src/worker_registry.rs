use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::availability::PoolSender;
use crate::worker_info::*;

/// Requests served by the registry task.
#[derive(Debug)]
enum RegistryCommand {
    MarkOffline {
        address: WorkerAddress,
    },
    CloseBarrier {
        drained: usize,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<HashMap<WorkerAddress, WorkerHandle>>,
    },
}

/// Registry for workers.
///
/// Owned by a single task (see [`WorkerRegistry::spawn`]) that consumes
/// registrations and [`RegistryHandle`] requests one at a time, so the worker
/// map and the online count have exactly one writer.
#[derive(Debug)]
pub struct WorkerRegistry {
    /// Every address ever registered, online or not.
    workers: HashMap<WorkerAddress, WorkerHandle>,

    /// Number of entries in `workers` with `online` set.
    online: usize,

    /// Newly online workers are made available here.
    pool: PoolSender,

    /// Publishes `online` whenever it changes.
    online_tx: watch::Sender<usize>,
}

impl WorkerRegistry {
    pub fn new(pool: PoolSender) -> Self {
        let (online_tx, _) = watch::channel(0);
        Self {
            workers: HashMap::new(),
            online: 0,
            pool,
            online_tx,
        }
    }

    fn publish_online(&self) {
        self.online_tx.send_replace(self.online);
    }

    /// Add a worker, or bring an offline one back, and make it available.
    ///
    /// A worker that comes back is reset to online with no memory of its
    /// earlier failure. Registering an address that is already online changes
    /// nothing, since that worker is either in the pool or running a job.
    /// Returns whether the worker became online.
    pub fn register(&mut self, address: WorkerAddress) -> bool {
        if matches!(self.workers.get(&address), Some(worker) if worker.online) {
            debug!(%address, "worker is already online, ignoring registration");
            return false;
        }

        self.workers
            .insert(address.clone(), WorkerHandle::new(address.clone()));
        self.online += 1;
        self.publish_online();
        self.pool.release(address.clone());

        info!(%address, online = self.online, "worker registered");
        true
    }

    /// Mark a worker offline after a failed job.
    ///
    /// Idempotent: only the first call for an online worker decrements the
    /// online count. Returns whether the worker was online.
    pub fn mark_offline(&mut self, address: &str) -> bool {
        match self.workers.get_mut(address) {
            Some(worker) if worker.online => {
                worker.online = false;
                self.online -= 1;
                self.publish_online();
                warn!(%address, online = self.online, "worker marked offline");
                true
            }
            Some(_) => false,
            None => {
                warn!(%address, "tried to mark an unknown worker offline");
                false
            }
        }
    }

    #[cfg(test)]
    fn online_count(&self) -> usize {
        self.online
    }

    /// Addresses of the workers currently online.
    pub fn online_workers(&self) -> Vec<WorkerAddress> {
        let mut online: Vec<_> = self
            .workers
            .values()
            .filter(|worker| worker.online)
            .map(|worker| worker.address.clone())
            .collect();
        online.sort();
        online
    }

    /// Every known worker, including offline ones.
    pub fn snapshot(&self) -> HashMap<WorkerAddress, WorkerHandle> {
        self.workers.clone()
    }

    /// Decide whether a barrier that has taken `drained` workers out of the
    /// pool is complete. If it is, the online workers are put back into the
    /// pool in the same step, so a registration can never be counted twice.
    pub fn close_barrier(&self, drained: usize) -> bool {
        if drained < self.online {
            return false;
        }

        let online = self.online_workers();
        debug!(drained, online = online.len(), "barrier closed, re-seeding pool");
        self.pool.reseed(online);
        true
    }

    fn handle(&mut self, command: RegistryCommand) {
        match command {
            RegistryCommand::MarkOffline { address } => {
                self.mark_offline(&address);
            }
            RegistryCommand::CloseBarrier { drained, reply } => {
                let _ = reply.send(self.close_barrier(drained));
            }
            RegistryCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Move the registry into its own task.
    ///
    /// The task listens on `registrations` for as long as it is open and
    /// serves requests until every [`RegistryHandle`] is dropped.
    pub fn spawn(self, registrations: mpsc::UnboundedReceiver<WorkerAddress>) -> RegistryHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let handle = RegistryHandle {
            commands,
            online: self.online_tx.subscribe(),
        };

        tokio::spawn(self.run(registrations, commands_rx));
        handle
    }

    async fn run(
        mut self,
        mut registrations: mpsc::UnboundedReceiver<WorkerAddress>,
        mut commands: mpsc::UnboundedReceiver<RegistryCommand>,
    ) {
        let mut listening = true;

        loop {
            tokio::select! {
                address = registrations.recv(), if listening => match address {
                    Some(address) => {
                        self.register(address);
                    }
                    None => {
                        debug!("registration channel closed");
                        listening = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        debug!("worker registry stopped");
    }
}

/// Cheap, cloneable access to a running [`WorkerRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    commands: mpsc::UnboundedSender<RegistryCommand>,
    online: watch::Receiver<usize>,
}

impl RegistryHandle {
    fn send(&self, command: RegistryCommand) {
        if self.commands.send(command).is_err() {
            warn!("worker registry is gone");
        }
    }

    pub fn mark_offline(&self, address: WorkerAddress) {
        self.send(RegistryCommand::MarkOffline { address });
    }

    /// See [`WorkerRegistry::close_barrier`].
    pub async fn close_barrier(&self, drained: usize) -> bool {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::CloseBarrier { drained, reply });
        rx.await.unwrap_or(false)
    }

    pub async fn snapshot(&self) -> HashMap<WorkerAddress, WorkerHandle> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Snapshot { reply });
        rx.await.unwrap_or_default()
    }

    /// Online count as last published. May lag behind the registry task.
    pub fn online_count(&self) -> usize {
        *self.online.borrow()
    }

    /// Receiver that is notified whenever the online count changes.
    pub fn online_watch(&self) -> watch::Receiver<usize> {
        self.online.clone()
    }
}
