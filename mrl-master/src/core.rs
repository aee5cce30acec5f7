use tokio::sync::mpsc;
use tonic::{Request, Response, Status};
use tracing::info;

pub use master::master_server::{Master, MasterServer};
use master::{RegisterReply, RegisterRequest};
pub mod master {
    tonic::include_proto!("master");
}

pub mod worker {
    tonic::include_proto!("worker");
}
pub use worker::worker_client::WorkerClient;

use crate::worker_info::WorkerAddress;

/// The master's registration endpoint.
///
/// Forwards every announced address to the worker registry. It knows nothing
/// about phases; a worker may register at any point of a run.
#[derive(Debug)]
pub struct MasterService {
    registrations: mpsc::UnboundedSender<WorkerAddress>,
}

impl MasterService {
    pub fn new(registrations: mpsc::UnboundedSender<WorkerAddress>) -> Self {
        Self { registrations }
    }
}

#[tonic::async_trait]
impl Master for MasterService {
    /// Worker announces itself.
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterReply>, Status> {
        let remote = request.remote_addr();
        let address = request.into_inner().address;
        if address.is_empty() {
            return Err(Status::invalid_argument("worker address is empty"));
        }

        info!(%address, ?remote, "registration request");
        self.registrations
            .send(address)
            .map_err(|_| Status::unavailable("master is no longer accepting workers"))?;

        Ok(Response::new(RegisterReply { ok: true }))
    }
}
