/// Address of a worker's `Worker` service. Unique key in the registry.
pub type WorkerAddress = String;

/// A worker known to the master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    /// Where the worker's gRPC server listens.
    pub address: WorkerAddress,

    /// False once a job sent to this worker failed. Only a new registration
    /// brings it back.
    pub online: bool,
}

impl WorkerHandle {
    /// Workers start off online.
    pub fn new(address: WorkerAddress) -> Self {
        Self {
            address,
            online: true,
        }
    }
}
