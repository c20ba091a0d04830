use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use tokio::task::JoinHandle;

use crate::{
    events::{Event, EventEmitter},
    task::Batch,
    worker::{Invoker, ProcessInvoker, WorkerLocator},
};

pub mod progress;
pub mod scheduler;

pub use scheduler::{BatchSummary, WorkerPool, run_tasks};

/// Upper bound for simultaneous worker processes, whatever the CPU count
pub const MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Parallelism to assume instead of the number of logical CPUs.
    /// Still capped at [`MAX_WORKERS`].
    pub parallelism: Option<usize>,

    /// Directory the worker is searched from, defaults to the directory of
    /// the running executable
    pub exe_dir: Option<PathBuf>,

    pub locator: WorkerLocator,
}

impl DispatchConfig {
    pub fn worker_cap(&self) -> usize {
        self.parallelism
            .unwrap_or_else(num_cpus::get)
            .clamp(1, MAX_WORKERS)
    }

    pub fn exe_dir(&self) -> Result<PathBuf, BatchError> {
        match &self.exe_dir {
            Some(dir) => Ok(dir.clone()),
            None => executable_dir(),
        }
    }
}

pub fn executable_dir() -> Result<PathBuf, BatchError> {
    let exe = std::env::current_exe().map_err(BatchError::ExecutablePath)?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or(BatchError::NoParentDirectory(exe))
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Error getting executable path: {0}")]
    ExecutablePath(std::io::Error),
    #[error("Executable has no parent directory: {0}")]
    NoParentDirectory(PathBuf),
    #[error("Batch task did not finish: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Runs batches of worker invocations and reports through an [`EventEmitter`]
pub struct Dispatcher<E: EventEmitter> {
    config: DispatchConfig,
    emitter: Arc<E>,
}

impl<E: EventEmitter> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            emitter: self.emitter.clone(),
        }
    }
}

impl<E: EventEmitter> Dispatcher<E> {
    pub fn new(config: DispatchConfig, emitter: E) -> Self {
        Self {
            config,
            emitter: Arc::new(emitter),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Starts the batch in the background and returns immediately.
    ///
    /// Must be called from within a tokio runtime. Dropping the returned
    /// handle does not stop the batch.
    pub fn run_batch(&self, batch: Batch) -> BatchHandle {
        let this = self.clone();
        BatchHandle(tokio::spawn(async move { this.execute(batch).await }))
    }

    /// Runs a whole batch: resolves the worker once, then runs every file.
    ///
    /// Fails only when the worker cannot be located at all, in which case
    /// nothing is dispatched and no completion event is sent.
    pub async fn execute(&self, batch: Batch) -> Result<BatchSummary, BatchError> {
        self.execute_in(batch, self.config.exe_dir()).await
    }

    /// Runs a batch with the worker searched from `exe_dir`, the result of
    /// the executable directory lookup
    async fn execute_in(
        &self,
        batch: Batch,
        exe_dir: Result<PathBuf, BatchError>,
    ) -> Result<BatchSummary, BatchError> {
        log::info!("Starting task: {} with {} files", batch.command, batch.files.len());

        let exe_dir = match exe_dir {
            Ok(dir) => dir,
            Err(e) => {
                log::error!("{e}");
                self.emitter.emit(Event::TaskLog(e.to_string()));
                return Err(e);
            }
        };
        let strategy = self.config.locator.resolve(&exe_dir);

        Ok(self.execute_with(batch, ProcessInvoker::new(strategy)).await)
    }

    /// Runs a batch with an already chosen invoker, then emits `task_complete`
    pub async fn execute_with<I: Invoker>(&self, batch: Batch, invoker: I) -> BatchSummary {
        let start = Instant::now();
        let pool = WorkerPool::new(self.config.worker_cap());
        log::info!("Using {} parallel workers", pool.size());

        let summary = run_tasks(
            batch.tasks().collect(),
            Arc::new(invoker),
            &pool,
            self.emitter.clone(),
        )
        .await;

        log::info!(
            "Task completed: {} - processed {} files in {:?}",
            batch.command,
            summary.total,
            start.elapsed(),
        );
        self.emitter.emit(Event::TaskComplete);
        summary
    }
}

/// A batch running in the background
#[derive(Debug)]
pub struct BatchHandle(JoinHandle<Result<BatchSummary, BatchError>>);

impl BatchHandle {
    pub async fn wait(self) -> Result<BatchSummary, BatchError> {
        self.0.await?
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        events::ChannelEmitter,
        task::{Progress, Task, TaskResult, TaskStatus},
        worker::WorkerOutput,
    };

    struct EchoInvoker;

    impl Invoker for EchoInvoker {
        async fn invoke(&self, task: &Task) -> WorkerOutput {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            WorkerOutput::success(format!("{} {}", task.command, task.display_name()))
        }
    }

    fn config(parallelism: usize) -> DispatchConfig {
        DispatchConfig {
            parallelism: Some(parallelism),
            ..Default::default()
        }
    }

    #[test]
    fn worker_cap_is_bounded() {
        assert_eq!(config(2).worker_cap(), 2);
        assert_eq!(config(64).worker_cap(), MAX_WORKERS);
        assert_eq!(config(0).worker_cap(), 1);

        let default_cap = DispatchConfig::default().worker_cap();
        assert_eq!(default_cap, num_cpus::get().min(MAX_WORKERS));
    }

    #[tokio::test]
    async fn completion_is_last_and_unique() {
        let events = Arc::new(Mutex::new(vec![]));
        let sink = events.clone();
        let dispatcher = Dispatcher::new(config(2), move |e: Event| sink.lock().unwrap().push(e));

        let files = ["a.epub", "b.epub", "c.epub", "d.epub", "e.epub"];
        let summary = dispatcher.execute_with(Batch::new(files, "s2t"), EchoInvoker).await;
        assert_eq!(summary.succeeded, 5);

        let events = events.lock().unwrap();
        let count = |name: &str| events.iter().filter(|e| e.name() == name).count();
        assert_eq!(count("task_result"), 5);
        assert_eq!(count("task_progress"), 5);
        assert_eq!(count("task_complete"), 1);
        assert_eq!(events.last(), Some(&Event::TaskComplete));

        let last_progress = events.iter().rev().find_map(|e| match e {
            Event::TaskProgress(p) => Some(*p),
            _ => None,
        });
        assert_eq!(last_progress, Some(Progress { completed: 5, total: 5 }));

        assert!(events.contains(&Event::TaskResult(TaskResult::success_raw("c.epub", "s2t c.epub"))));
    }

    #[tokio::test]
    async fn missing_executable_dir_aborts_before_dispatch() {
        let events = Arc::new(Mutex::new(vec![]));
        let sink = events.clone();
        let dispatcher = Dispatcher::new(config(2), move |e: Event| sink.lock().unwrap().push(e));

        let lookup = Err(BatchError::NoParentDirectory(PathBuf::from("/")));
        let result = dispatcher
            .execute_in(Batch::new(["a.epub", "b.epub"], "encrypt"), lookup)
            .await;
        assert!(matches!(result, Err(BatchError::NoParentDirectory(_))));

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![Event::TaskLog("Executable has no parent directory: /".into())],
        );
    }

    #[tokio::test]
    async fn run_batch_is_detached() {
        let (emitter, mut rx) = ChannelEmitter::new();
        let dispatcher = Dispatcher::new(config(4), emitter);

        let handle = dispatcher.run_batch(Batch::new(["x.epub", "y.epub"], "t2s"));
        drop(dispatcher);

        let mut names = vec![];
        let collect = async {
            while let Some(event) = rx.recv().await {
                names.push(event.name());
                if event == Event::TaskComplete {
                    break;
                }
            }
        };
        tokio::select! {
            _ = collect => {},
            _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => panic!("Deadlock"),
        }

        assert_eq!(names.iter().filter(|n| **n == "task_result").count(), 2);
        assert_eq!(names.last(), Some(&"task_complete"));

        // no process could be found for these, they all fail
        let summary = handle.wait().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed + summary.succeeded + summary.skipped, 2);
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        /// Executable directory holding a fallback "script" run with `sh`
        fn worker_dir(script: &str) -> tempfile::TempDir {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("python_core").join("cli.py");
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, script).unwrap();
            dir
        }

        fn sh_config(dir: &Path, parallelism: usize) -> DispatchConfig {
            DispatchConfig {
                parallelism: Some(parallelism),
                exe_dir: Some(dir.to_path_buf()),
                locator: WorkerLocator {
                    interpreter: "sh".into(),
                    ..Default::default()
                },
            }
        }

        async fn run(config: DispatchConfig, batch: Batch) -> (BatchSummary, Vec<Event>) {
            let events = Arc::new(Mutex::new(vec![]));
            let sink = events.clone();
            let dispatcher = Dispatcher::new(config, move |e: Event| sink.lock().unwrap().push(e));
            let summary = dispatcher.execute(batch).await.unwrap();
            let events = events.lock().unwrap().clone();
            (summary, events)
        }

        fn results(events: &[Event]) -> Vec<TaskResult> {
            events
                .iter()
                .filter_map(|e| match e {
                    Event::TaskResult(r) => Some(r.clone()),
                    _ => None,
                })
                .collect()
        }

        #[tokio::test]
        async fn structured_output_with_output_path() {
            let dir = worker_dir(
                r#"echo '{"status":"success","file":"a.epub","output_path":"/out/a.epub"}'"#,
            );
            let (summary, events) = run(sh_config(dir.path(), 2), Batch::new(["a.epub"], "encrypt")).await;

            assert_eq!(summary.succeeded, 1);
            assert_eq!(results(&events), vec![TaskResult {
                status: TaskStatus::Success,
                message: String::new(),
                file: "a.epub".into(),
                output_path: Some("/out/a.epub".into()),
            }]);
            assert!(events.contains(&Event::TaskLog("Done: a.epub\nOutput: /out/a.epub".into())));
        }

        #[tokio::test]
        async fn arguments_reach_the_worker() {
            let dir = worker_dir(r#"printf '%s|' "$@""#);
            let batch = Batch::new(["/in/a.epub"], "font_subset")
                .output_dir("/out")
                .extra(r#"{"quality":80}"#);
            let (_, events) = run(sh_config(dir.path(), 1), batch).await;

            assert_eq!(
                results(&events)[0].message,
                r#"font_subset|--input|/in/a.epub|--extra|{"quality":80}|--output|/out|"#,
            );
        }

        #[tokio::test]
        async fn non_zero_exit_is_an_error() {
            let dir = worker_dir("echo \"cannot open $3\"\nexit 1\n");
            let (summary, events) = run(sh_config(dir.path(), 2), Batch::new(["a.epub", "b.epub"], "decrypt")).await;

            assert_eq!(summary.failed, 2);
            for result in results(&events) {
                assert_eq!(result.status, TaskStatus::Error);
                assert!(result.message.starts_with("Error: exit status: 1. Output: cannot open "));
            }
            assert_eq!(events.last(), Some(&Event::TaskComplete));
        }

        #[tokio::test]
        async fn missing_worker_fails_every_file() {
            let dir = tempfile::tempdir().unwrap();
            let config = DispatchConfig {
                parallelism: Some(2),
                exe_dir: Some(dir.path().to_path_buf()),
                ..Default::default()
            };
            let files = ["a.epub", "b.epub", "c.epub"];
            let (summary, events) = run(config, Batch::new(files, "reformat")).await;

            assert_eq!(summary.failed, 3);
            let results = results(&events);
            assert_eq!(results.len(), 3);
            assert!(results.iter().all(TaskResult::is_error));
            assert_eq!(events.last(), Some(&Event::TaskComplete));
        }
    }
}
