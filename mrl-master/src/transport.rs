use anyhow::{anyhow, Context, Result};
use tonic::transport::Channel;
use tonic::Request;

use common::Operation;

use crate::core::worker::{self, DoJobRequest, ShutdownRequest};
use crate::core::WorkerClient;
use crate::jobs::DoJobArgs;

/// Reply to `DoJob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoJobReply {
    pub ok: bool,
}

/// Reply to `Shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReply {
    /// Jobs the worker completed over its lifetime.
    pub n_jobs: u32,
}

/// The remote calls the scheduler makes on workers.
///
/// An `Err` means the call did not complete (worker unreachable, connection
/// dropped). There is no timeout: a call that never returns keeps its
/// dispatch task waiting.
#[tonic::async_trait]
pub trait WorkerTransport: Send + Sync + 'static {
    async fn do_job(&self, address: &str, args: DoJobArgs) -> Result<DoJobReply>;

    async fn shutdown(&self, address: &str) -> Result<ShutdownReply>;
}

/// [`WorkerTransport`] over the gRPC `Worker` service.
///
/// Connects on every call, so a worker that restarted on the same address is
/// reached without any cached state.
#[derive(Debug, Default, Clone)]
pub struct GrpcTransport;

impl GrpcTransport {
    async fn connect(address: &str) -> Result<WorkerClient<Channel>> {
        WorkerClient::connect(format!("http://{}", address))
            .await
            .with_context(|| format!("connecting to worker {address}"))
    }
}

fn to_request(args: DoJobArgs) -> Result<DoJobRequest> {
    let operation = match args.operation {
        Operation::Map => worker::Operation::Map,
        Operation::Reduce => worker::Operation::Reduce,
    };

    Ok(DoJobRequest {
        file: args.file,
        operation: operation as i32,
        job_number: u32::try_from(args.job_number)
            .map_err(|_| anyhow!("job number {} out of range", args.job_number))?,
        num_other_phase: u32::try_from(args.num_other_phase)
            .map_err(|_| anyhow!("job count {} out of range", args.num_other_phase))?,
    })
}

#[tonic::async_trait]
impl WorkerTransport for GrpcTransport {
    async fn do_job(&self, address: &str, args: DoJobArgs) -> Result<DoJobReply> {
        let request = Request::new(to_request(args)?);
        let mut client = Self::connect(address).await?;
        let reply = client.do_job(request).await?.into_inner();

        Ok(DoJobReply { ok: reply.ok })
    }

    async fn shutdown(&self, address: &str) -> Result<ShutdownReply> {
        let mut client = Self::connect(address).await?;
        let reply = client
            .shutdown(Request::new(ShutdownRequest {}))
            .await?
            .into_inner();

        Ok(ShutdownReply {
            n_jobs: reply.n_jobs,
        })
    }
}
