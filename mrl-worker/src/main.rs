use std::net::SocketAddr;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};

mod core;
use crate::core::{MRWorker, MasterClient, RegisterRequest, WorkerServer};

mod args;
use args::Args;

mod map;
mod reduce;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let workload = workload::try_named(&args.workload)
        .ok_or_else(|| format!("The workload `{}` is not a known workload", args.workload))?;
    let max_jobs = u32::try_from(args.max_jobs).ok();

    // Start server as background task.
    let addr: SocketAddr = format!("[::1]:{}", args.port).parse()?;
    let shutdown = CancellationToken::new();
    let worker = MRWorker::new(workload, max_jobs, shutdown.clone());
    let server = {
        let stop = shutdown.clone();
        tokio::spawn(
            Server::builder()
                .add_service(WorkerServer::new(worker))
                .serve_with_shutdown(addr, async move { stop.cancelled().await }),
        )
    };
    info!("Worker server listening on {}", addr);
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let mut client = MasterClient::connect(args.master).await?;
    let request = tonic::Request::new(RegisterRequest {
        address: addr.to_string(),
    });
    client.register(request).await?;
    info!("Worker registered as {}", addr);

    // Ctrl-C stops the worker the same way a `Shutdown` RPC does.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupted, stopping worker server...");
                    shutdown.cancel();
                }
                Err(err) => error!("Unable to listen for shutdown signal: {}", err),
            }
        });
    }

    server.await??;
    info!("Worker server exited...");
    Ok(())
}
