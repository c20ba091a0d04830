use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// The arguments of a single batch run: one worker invocation per file, all
/// sharing the same command, output directory and extra parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub files: Vec<PathBuf>,
    pub command: String,
    pub output_dir: Option<PathBuf>,

    /// Opaque parameter blob forwarded verbatim to the worker as `--extra`
    pub extra: String,
}

impl Batch {
    pub fn new(
        files: impl IntoIterator<Item = impl Into<PathBuf>>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            command: command.into(),
            output_dir: None,
            extra: "{}".to_string(),
        }
    }

    /// Sets the output directory, an empty path means "no output directory"
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.output_dir = if dir.as_os_str().is_empty() { None } else { Some(dir) };
        self
    }

    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    pub fn tasks(&self) -> impl Iterator<Item = Task> + '_ {
        self.files.iter().map(|file| Task {
            file: file.clone(),
            command: self.command.clone(),
            output_dir: self.output_dir.clone(),
            extra: self.extra.clone(),
        })
    }
}

/// One file of a batch, together with the invocation parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    pub file: PathBuf,
    pub command: String,
    pub output_dir: Option<PathBuf>,
    pub extra: String,
}

impl Task {
    /// File name used in log lines and short messages
    pub fn display_name(&self) -> String {
        file_name(&self.file)
    }

    pub fn file_string(&self) -> String {
        self.file.to_string_lossy().into_owned()
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Status reported for a file. Words the worker uses that are not known
/// here are kept as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Success,
    Error,
    /// The worker decided there was nothing to do for this file
    Skip,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
            TaskStatus::Skip => "skip",
            TaskStatus::Other(status) => status,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "" | "success" => TaskStatus::Success,
            "error" => TaskStatus::Error,
            "skip" => TaskStatus::Skip,
            _ => TaskStatus::Other(status),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one task, exactly one per file of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub message: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

impl TaskResult {
    /// A successful run whose output was not a structured record
    pub fn success_raw(file: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Success,
            message: output.into(),
            file: file.into(),
            output_path: None,
        }
    }

    pub fn error(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Error,
            message: message.into(),
            file: file.into(),
            output_path: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == TaskStatus::Error
    }
}

/// Snapshot of the batch progress, `current` files out of `total` are done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Progress {
    #[serde(rename = "current")]
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self { completed: 0, total }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}
