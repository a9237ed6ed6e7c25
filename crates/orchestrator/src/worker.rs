//! Worker pool draining the bounded task queue
//!
//! Workers share one receiver and run each job through the pipeline executor.
//! Outcomes go over a result channel to a single recorder task, which applies
//! the terminal transitions to the tracker. Each run happens in its own task so
//! a panicking engine fails that task instead of taking the worker down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use video_edit_core::{
    ExecutionContext, ExecutionError, Operation, PipelineExecutor, PipelineOutcome,
};

use crate::tracker::{TaskError, TaskId, TaskOutput, TaskTracker, Transition};

/// A queued unit of work
#[derive(Debug)]
pub(crate) struct Job {
    pub task_id: TaskId,
    pub source: PathBuf,
    pub operations: Vec<Operation>,
    pub output_path: PathBuf,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
struct JobOutcome {
    task_id: TaskId,
    /// Outer error: the executor run panicked
    result: Result<Result<PipelineOutcome, ExecutionError>, JoinError>,
}

/// Settings shared by all workers
#[derive(Debug, Clone)]
pub(crate) struct WorkerSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub work_dir: PathBuf,
    pub task_timeout: Duration,
}

pub(crate) struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    recorder: JoinHandle<()>,
}

impl WorkerPool {
    /// Spawn the workers and the recorder; returns the queue's sending side
    pub fn spawn(
        settings: WorkerSettings,
        executor: Arc<PipelineExecutor>,
        tracker: Arc<TaskTracker>,
    ) -> (mpsc::Sender<Job>, Self) {
        let (job_tx, job_rx) = mpsc::channel::<Job>(settings.queue_capacity.max(1));
        let (result_tx, result_rx) = mpsc::channel::<JobOutcome>(settings.workers.max(1) * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));

        info!(
            "Starting {} workers (queue capacity {}, task timeout {}s)",
            settings.workers,
            settings.queue_capacity,
            settings.task_timeout.as_secs()
        );

        let workers = (0..settings.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&job_rx),
                    result_tx.clone(),
                    Arc::clone(&executor),
                    Arc::clone(&tracker),
                    settings.clone(),
                ))
            })
            .collect();
        drop(result_tx);

        let recorder = tokio::spawn(run_recorder(result_rx, tracker));
        (job_tx, Self { workers, recorder })
    }

    /// Wait for queued jobs to drain once every sender is dropped
    pub async fn join(self) {
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!("Worker panicked: {}", e);
            }
        }
        if let Err(e) = self.recorder.await {
            error!("Recorder panicked: {}", e);
        }
    }
}

async fn run_worker(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<JobOutcome>,
    executor: Arc<PipelineExecutor>,
    tracker: Arc<TaskTracker>,
    settings: WorkerSettings,
) {
    loop {
        // Only one worker waits on the queue at a time; the lock is released before executing
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else {
            debug!("Worker {} stopping: queue closed", worker_id);
            break;
        };

        // A task cancelled while queued is already terminal; skip it
        if let Err(e) = tracker.transition(&job.task_id, Transition::Start).await {
            debug!("Worker {} skipping task {}: {}", worker_id, job.task_id, e);
            continue;
        }

        info!("Worker {} picked up task {}", worker_id, job.task_id);
        let ctx = ExecutionContext::new(
            job.task_id.to_string(),
            settings.work_dir.join(job.task_id.to_string()),
            job.output_path,
        )
        .with_cancel(job.cancel)
        .with_timeout(settings.task_timeout);
        let work_dir = ctx.work_dir.clone();

        let run = {
            let executor = Arc::clone(&executor);
            let (operations, source) = (job.operations, job.source);
            tokio::spawn(async move { executor.execute(&operations, &source, &ctx).await })
        };
        let result = run.await;
        remove_dir_if_empty(&work_dir).await;

        let outcome = JobOutcome {
            task_id: job.task_id,
            result,
        };
        if results.send(outcome).await.is_err() {
            warn!("Worker {} stopping: recorder is gone", worker_id);
            break;
        }
    }
}

async fn run_recorder(mut results: mpsc::Receiver<JobOutcome>, tracker: Arc<TaskTracker>) {
    while let Some(JobOutcome { task_id, result }) = results.recv().await {
        let transition = match &result {
            Ok(Ok(PipelineOutcome::Completed(done))) => Transition::Complete(TaskOutput::from(done)),
            Ok(Ok(PipelineOutcome::Cancelled { .. })) => Transition::Cancel,
            Ok(Err(e)) => {
                warn!("Task {} failed: {}", task_id, e);
                Transition::Fail(TaskError::from(e))
            }
            Err(e) => {
                error!("Task {} aborted: {}", task_id, e);
                Transition::Fail(TaskError::internal(format!("worker panicked: {e}")))
            }
        };
        match tracker.transition(&task_id, transition).await {
            Ok(state) => info!("Task {} finished: {}", task_id, state),
            Err(e) => error!("Could not record outcome of task {}: {}", task_id, e),
        }
    }
}

/// Work directories only survive when they hold a diagnostic intermediate
async fn remove_dir_if_empty(dir: &std::path::Path) {
    // remove_dir fails on non-empty directories
    if tokio::fs::remove_dir(dir).await.is_ok() {
        debug!("Removed work directory {}", dir.display());
    }
}
