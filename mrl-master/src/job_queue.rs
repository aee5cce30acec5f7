use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::warn;

use crate::jobs::JobIndex;

/// Pending jobs of the phase in progress.
///
/// Only the dispatch loop pops from the queue. Dispatch tasks put failed jobs
/// back through a [`JobRequeue`] handle; those show up on the next pop.
#[derive(Debug)]
pub struct JobQueue {
    /// Jobs waiting to be handed to a worker.
    pending: VecDeque<JobIndex>,

    /// Failed jobs pushed back by dispatch tasks, not yet moved to `pending`.
    requeued: mpsc::UnboundedReceiver<JobIndex>,

    /// Kept so that handles can always be created.
    requeue: mpsc::UnboundedSender<JobIndex>,
}

impl JobQueue {
    /// A queue holding every job index of a phase with `num_jobs` jobs.
    pub fn new(num_jobs: usize) -> Self {
        let (requeue, requeued) = mpsc::unbounded_channel();
        Self {
            pending: (0..num_jobs).collect(),
            requeued,
            requeue,
        }
    }

    /// Handle for putting a failed job back.
    pub fn requeue_handle(&self) -> JobRequeue {
        JobRequeue(self.requeue.clone())
    }

    fn collect_requeued(&mut self) {
        while let Ok(job) = self.requeued.try_recv() {
            self.pending.push_back(job);
        }
    }

    /// Take any pending job. The job is no longer in the queue once returned.
    pub fn pop(&mut self) -> Option<JobIndex> {
        self.collect_requeued();
        self.pending.pop_front()
    }

    /// Number of jobs waiting, including requeued ones.
    pub fn len(&mut self) -> usize {
        self.collect_requeued();
        self.pending.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }
}

/// Puts failed jobs back into their [`JobQueue`].
#[derive(Debug, Clone)]
pub struct JobRequeue(mpsc::UnboundedSender<JobIndex>);

impl JobRequeue {
    pub fn push(&self, job: JobIndex) {
        if self.0.send(job).is_err() {
            warn!(job, "job queue is gone, dropping requeued job");
        }
    }
}
