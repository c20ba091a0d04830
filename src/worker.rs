use std::{
    ffi::OsString,
    path::PathBuf,
    process::{ExitStatus, Stdio},
};

use crate::task::Task;

pub mod decode;
pub mod resolve;

pub use decode::{decode_output, task_result};
pub use resolve::WorkerLocator;

/// How the external worker is launched, decided once per batch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkerStrategy {
    /// Packaged binary next to the executable
    Sidecar { path: PathBuf },
    /// Script run through an interpreter
    Fallback { interpreter: String, script: PathBuf },
}

impl WorkerStrategy {
    pub fn program(&self) -> OsString {
        match self {
            WorkerStrategy::Sidecar { path } => path.clone().into_os_string(),
            WorkerStrategy::Fallback { interpreter, .. } => interpreter.into(),
        }
    }

    /// `[script]? <command> --input <file> --extra <blob> [--output <dir>]`
    pub fn args(&self, task: &Task) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(8);
        if let WorkerStrategy::Fallback { script, .. } = self {
            args.push(script.clone().into_os_string());
        }
        args.push(task.command.clone().into());
        args.push("--input".into());
        args.push(task.file.clone().into_os_string());
        args.push("--extra".into());
        args.push(task.extra.clone().into());
        if let Some(dir) = &task.output_dir {
            args.push("--output".into());
            args.push(dir.clone().into_os_string());
        }
        args
    }

    pub fn command(&self, task: &Task) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(self.program());
        command
            .args(self.args(task))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    /// Shell-quoted command line, for logging only
    pub fn display_command(&self, task: &Task) -> String {
        let parts = std::iter::once(self.program())
            .chain(self.args(task))
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        shlex::try_join(parts.iter().map(String::as_str)).unwrap_or_else(|_| parts.join(" "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to start worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("{0}")]
    Exit(ExitStatus),
}

/// Raw result of one worker invocation
#[derive(Debug)]
pub struct WorkerOutput {
    /// Standard output followed by standard error
    pub output: Vec<u8>,
    pub outcome: Result<(), InvokeError>,
}

impl WorkerOutput {
    pub fn success(output: impl Into<Vec<u8>>) -> Self {
        Self { output: output.into(), outcome: Ok(()) }
    }

    pub fn failure(output: impl Into<Vec<u8>>, error: InvokeError) -> Self {
        Self { output: output.into(), outcome: Err(error) }
    }
}

/// Runs the worker for a single task.
///
/// Implementations must not fail: every problem is reported through
/// [`WorkerOutput::outcome`] so that the batch can carry on.
pub trait Invoker: Send + Sync + 'static {
    fn invoke(&self, task: &Task) -> impl Future<Output = WorkerOutput> + Send;
}

/// Spawns one OS process per task using a resolved [`WorkerStrategy`]
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    strategy: WorkerStrategy,
}

impl ProcessInvoker {
    pub fn new(strategy: WorkerStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &WorkerStrategy {
        &self.strategy
    }
}

impl Invoker for ProcessInvoker {
    async fn invoke(&self, task: &Task) -> WorkerOutput {
        log::debug!("Running: {}", self.strategy.display_command(task));

        let output = match self.strategy.command(task).output().await {
            Ok(output) => output,
            Err(e) => return WorkerOutput::failure(Vec::new(), InvokeError::Spawn(e)),
        };

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        if output.status.success() {
            WorkerOutput::success(combined)
        } else {
            WorkerOutput::failure(combined, InvokeError::Exit(output.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::task::{Batch, TaskStatus};

    fn task(output_dir: &str) -> Task {
        Batch::new(["/books/a.epub"], "encrypt")
            .output_dir(output_dir)
            .extra(r#"{"k":"v w"}"#)
            .tasks()
            .next()
            .unwrap()
    }

    #[test]
    fn sidecar_args() {
        let strategy = WorkerStrategy::Sidecar { path: "/app/epub_tool_backend".into() };
        assert_eq!(strategy.program(), OsString::from("/app/epub_tool_backend"));
        assert_eq!(
            strategy.args(&task("/out")),
            ["encrypt", "--input", "/books/a.epub", "--extra", r#"{"k":"v w"}"#, "--output", "/out"]
                .map(OsString::from)
                .to_vec(),
        );
        assert_eq!(
            strategy.args(&task("")),
            ["encrypt", "--input", "/books/a.epub", "--extra", r#"{"k":"v w"}"#]
                .map(OsString::from)
                .to_vec(),
        );
    }

    #[test]
    fn fallback_args() {
        let strategy = WorkerStrategy::Fallback {
            interpreter: "python3".into(),
            script: "python_core/cli.py".into(),
        };
        assert_eq!(strategy.program(), OsString::from("python3"));
        let args = strategy.args(&task("/out"));
        assert_eq!(args[0], OsString::from("python_core/cli.py"));
        assert_eq!(args[1], OsString::from("encrypt"));
        assert_eq!(args.len(), 8);
    }

    #[test]
    fn display_command_is_quoted() {
        let strategy = WorkerStrategy::Sidecar { path: "/app/backend".into() };
        let line = strategy.display_command(&task(""));
        assert!(line.starts_with("/app/backend encrypt --input /books/a.epub --extra "));
        assert_eq!(
            shlex::split(&line).unwrap(),
            ["/app/backend", "encrypt", "--input", "/books/a.epub", "--extra", r#"{"k":"v w"}"#],
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let invoker = ProcessInvoker::new(WorkerStrategy::Sidecar {
            path: Path::new("/nonexistent/epub_tool_backend").to_path_buf(),
        });
        let output = invoker.invoke(&task("")).await;
        assert!(matches!(output.outcome, Err(InvokeError::Spawn(_))));
        assert_eq!(task_result(&task(""), &output).status, TaskStatus::Error);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn combined_output_and_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("worker.sh");
        std::fs::write(&script, "echo out-$1\necho err-$3 >&2\nexit 3\n").unwrap();

        let invoker = ProcessInvoker::new(WorkerStrategy::Fallback {
            interpreter: "sh".into(),
            script,
        });
        let output = invoker.invoke(&task("")).await;

        assert_eq!(String::from_utf8_lossy(&output.output), "out-encrypt\nerr-/books/a.epub\n");
        match output.outcome {
            Err(InvokeError::Exit(status)) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
