use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    task::{Id, JoinSet},
};

use crate::{
    events::{Event, EventEmitter},
    run::progress::ProgressTracker,
    task::{Task, TaskResult, TaskStatus},
    worker::{Invoker, task_result},
};

/// Fixed number of slots, one per running worker process
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
}

/// A taken pool slot, given back when dropped
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Waits for a free slot
    pub async fn acquire(&self) -> Slot {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed");
        Slot { _permit: permit }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Results with a status word of the worker's own
    pub other: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn record(&mut self, status: &TaskStatus) {
        match status {
            TaskStatus::Success => self.succeeded += 1,
            TaskStatus::Error => self.failed += 1,
            TaskStatus::Skip => self.skipped += 1,
            TaskStatus::Other(_) => self.other += 1,
        }
    }
}

/// Runs one invocation per task, at most `pool.size()` at a time.
///
/// Every task yields exactly one `task_result` followed (possibly with other
/// tasks' events in between) by one `task_progress`. Returns once all the
/// tasks have finished and released their slot.
pub async fn run_tasks<I, E>(
    tasks: Vec<Task>,
    invoker: Arc<I>,
    pool: &WorkerPool,
    emitter: Arc<E>,
) -> BatchSummary
where
    I: Invoker,
    E: EventEmitter,
{
    let start = Instant::now();
    let progress = Arc::new(ProgressTracker::new(tasks.len()));
    let mut summary = BatchSummary {
        total: tasks.len(),
        ..Default::default()
    };

    let mut running = JoinSet::new();
    let mut in_flight: HashMap<Id, Task> = HashMap::new();

    for task in tasks {
        let slot = pool.acquire().await;
        let handle = running.spawn(run_task(
            task.clone(),
            slot,
            invoker.clone(),
            emitter.clone(),
            progress.clone(),
        ));
        in_flight.insert(handle.id(), task);
    }

    while let Some(joined) = running.join_next_with_id().await {
        match joined {
            Ok((id, status)) => {
                in_flight.remove(&id);
                summary.record(&status);
            }
            Err(e) => {
                // the task died before reporting, account for its file here
                let Some(task) = in_flight.remove(&e.id()) else {
                    log::error!("Lost track of a failed worker task: {e}");
                    continue;
                };
                log::error!("Worker task for {} failed: {e}", task.display_name());
                let result = TaskResult::error(task.file_string(), format!("Error: {e}"));
                let line = format!("Error: {} - {e}", task.display_name());
                summary.record(&finish(result, line, &*emitter, &progress));
            }
        }
    }

    summary.elapsed = start.elapsed();
    summary
}

async fn run_task<I, E>(
    task: Task,
    _slot: Slot,
    invoker: Arc<I>,
    emitter: Arc<E>,
    progress: Arc<ProgressTracker>,
) -> TaskStatus
where
    I: Invoker,
    E: EventEmitter,
{
    let name = task.display_name();
    let start = Instant::now();
    log::info!("Processing: {name}");
    emitter.emit(Event::TaskLog(format!("Processing {name}...")));

    let output = invoker.invoke(&task).await;
    let elapsed = start.elapsed();
    let result = task_result(&task, &output);

    let line = match &output.outcome {
        Err(e) => {
            log::error!("Error processing {name}: {e} (took {elapsed:?})");
            format!("Error: {name} - {e}")
        }
        Ok(()) => match &result.output_path {
            Some(path) => {
                log::info!("Completed: {name} -> {path} (took {elapsed:?})");
                format!("Done: {name}\nOutput: {path}")
            }
            None => {
                log::info!("Completed: {name} (took {elapsed:?})");
                format!("Done: {name}")
            }
        },
    };

    finish(result, line, &*emitter, &progress)
}

fn finish<E: EventEmitter>(
    result: TaskResult,
    line: String,
    emitter: &E,
    progress: &ProgressTracker,
) -> TaskStatus {
    let status = result.status.clone();
    emitter.emit(Event::TaskResult(result));
    emitter.emit(Event::TaskLog(line));
    progress.complete_one(|snapshot| emitter.emit(Event::TaskProgress(snapshot)));
    status
}
