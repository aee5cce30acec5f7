mod args;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use args::Args;

use clap::Parser;
use common::files;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};

use mrl_master::core::{MasterServer, MasterService};
use mrl_master::{GrpcTransport, MasterScheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Retrieve configuration from command line.
    let args = Args::parse();
    let file = Path::new(&args.file);

    // Configure address.
    let addr: SocketAddr = format!("[::1]:{}", args.port).parse()?;

    let config = SchedulerConfig::new(args.file.clone(), args.n_map, args.n_reduce)?;
    files::split(file, args.n_map)?;

    // Registration listener. Stays up for the whole run so workers can join
    // at any point.
    let (register_tx, register_rx) = mpsc::unbounded_channel();
    let stop_listener = CancellationToken::new();
    let listener = {
        let stop = stop_listener.clone();
        tokio::spawn(
            Server::builder()
                .add_service(MasterServer::new(MasterService::new(register_tx)))
                .serve_with_shutdown(addr, async move { stop.cancelled().await }),
        )
    };
    info!("MasterServer listening on {}", addr);

    let handle = MasterScheduler::spawn(config, Arc::new(GrpcTransport), register_rx);
    let record = handle.wait().await?;

    stop_listener.cancel();
    if let Err(e) = listener.await? {
        error!("registration listener failed: {}", e);
    }

    let output = files::merge(file, args.n_reduce)?;
    if !args.keep_intermediate {
        files::clean(file, args.n_map, args.n_reduce)?;
    }

    info!(
        workers = record.len(),
        jobs = record.iter().sum::<u32>(),
        ?record,
        "run complete, output in {}",
        output.display()
    );

    Ok(())
}
