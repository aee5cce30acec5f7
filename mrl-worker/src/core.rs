//
// Import gRPC stubs/definitions.
//
pub use master::{master_client::MasterClient, RegisterRequest};
pub mod master {
    tonic::include_proto!("master");
}

pub use worker::worker_server::{Worker, WorkerServer};
use worker::{DoJobReply, DoJobRequest, Operation, ShutdownReply, ShutdownRequest};
pub mod worker {
    tonic::include_proto!("worker");
}

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn};

use common::Workload;

use crate::map::perform_map;
use crate::reduce::perform_reduce;

pub struct MRWorker {
    /// The application this worker runs.
    workload: Workload,

    /// Stop serving after this many `DoJob` calls.
    max_jobs: Option<u32>,

    /// `DoJob` calls received so far.
    received: AtomicU32,

    /// Jobs that succeeded, reported on shutdown.
    completed: AtomicU32,

    /// Cancelled to stop the gRPC server.
    shutdown: CancellationToken,
}

impl MRWorker {
    pub fn new(workload: Workload, max_jobs: Option<u32>, shutdown: CancellationToken) -> Self {
        Self {
            workload,
            max_jobs,
            received: AtomicU32::new(0),
            completed: AtomicU32::new(0),
            shutdown,
        }
    }

    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::SeqCst)
    }

    async fn run_job(&self, request: DoJobRequest) -> anyhow::Result<()> {
        let workload = self.workload;
        let operation = request.operation();
        let file = PathBuf::from(request.file);
        let job_number = request.job_number as usize;
        let num_other_phase = request.num_other_phase as usize;

        tokio::task::spawn_blocking(move || match operation {
            Operation::Map => perform_map(&workload, &file, job_number, num_other_phase),
            Operation::Reduce => perform_reduce(&workload, &file, job_number, num_other_phase),
        })
        .await?
    }
}

#[tonic::async_trait]
impl Worker for MRWorker {
    async fn do_job(&self, request: Request<DoJobRequest>) -> Result<Response<DoJobReply>, Status> {
        let received = self.received.fetch_add(1, Ordering::SeqCst) + 1;
        if matches!(self.max_jobs, Some(max) if received > max) {
            return Err(Status::unavailable("worker is shutting down"));
        }

        let request = request.into_inner();
        let (operation, job_number) = (request.operation(), request.job_number);
        debug!(?operation, job_number, "received a job");

        let ok = match self.run_job(request).await {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                info!(?operation, job_number, "job done");
                true
            }
            Err(e) => {
                error!(?operation, job_number, "job failed: {:#}", e);
                false
            }
        };

        if matches!(self.max_jobs, Some(max) if received == max) {
            warn!(received, "job limit reached, no longer serving");
            self.shutdown.cancel();
        }

        Ok(Response::new(DoJobReply { ok }))
    }

    async fn shutdown(
        &self,
        _: Request<ShutdownRequest>,
    ) -> Result<Response<ShutdownReply>, Status> {
        let n_jobs = self.completed();
        info!(n_jobs, "shutdown requested");
        self.shutdown.cancel();

        Ok(Response::new(ShutdownReply { n_jobs }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::files::{merge_name, read_pairs, reduce_name, split_name};
    use common::KeyValue;

    fn worker(max_jobs: Option<u32>) -> (MRWorker, CancellationToken) {
        let shutdown = CancellationToken::new();
        let wc = workload::try_named("wc").unwrap();
        (MRWorker::new(wc, max_jobs, shutdown.clone()), shutdown)
    }

    fn job(file: &std::path::Path, operation: Operation, job_number: u32, other: u32) -> Request<DoJobRequest> {
        Request::new(DoJobRequest {
            file: file.display().to_string(),
            operation: operation as i32,
            job_number,
            num_other_phase: other,
        })
    }

    #[tokio::test]
    async fn map_then_reduce_counts_words() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("input.txt");
        std::fs::write(split_name(&file, 0), "to be or not to be").unwrap();
        let (worker, _) = worker(None);

        let reply = worker.do_job(job(&file, Operation::Map, 0, 1)).await.unwrap();
        assert!(reply.into_inner().ok);
        assert!(reduce_name(&file, 0, 0).exists());

        let reply = worker.do_job(job(&file, Operation::Reduce, 0, 1)).await.unwrap();
        assert!(reply.into_inner().ok);

        assert_eq!(
            read_pairs(&merge_name(&file, 0)).unwrap(),
            vec![
                KeyValue::new("be", "2"),
                KeyValue::new("not", "1"),
                KeyValue::new("or", "1"),
                KeyValue::new("to", "2"),
            ]
        );

        let reply = worker.shutdown(Request::new(ShutdownRequest {})).await.unwrap();
        assert_eq!(reply.into_inner().n_jobs, 2);
    }

    #[tokio::test]
    async fn failed_job_replies_not_ok_and_is_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, shutdown) = worker(None);

        let reply = worker
            .do_job(job(&dir.path().join("missing.txt"), Operation::Map, 0, 1))
            .await
            .unwrap();

        assert!(!reply.into_inner().ok);
        assert_eq!(worker.completed(), 0);
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn stops_serving_after_job_limit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("input.txt");
        std::fs::write(split_name(&file, 0), "hello").unwrap();
        let (worker, shutdown) = worker(Some(1));

        let reply = worker.do_job(job(&file, Operation::Map, 0, 1)).await.unwrap();
        assert!(reply.into_inner().ok);
        assert!(shutdown.is_cancelled());

        let status = worker
            .do_job(job(&file, Operation::Map, 0, 1))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }

    #[tokio::test]
    async fn shutdown_stops_the_server() {
        let (worker, shutdown) = worker(None);

        let reply = worker.shutdown(Request::new(ShutdownRequest {})).await.unwrap();

        assert_eq!(reply.into_inner().n_jobs, 0);
        assert!(shutdown.is_cancelled());
    }
}
