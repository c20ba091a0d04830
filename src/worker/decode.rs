use serde::Deserialize;
use serde_json::Value as Json;

use crate::{
    task::{Task, TaskResult, TaskStatus},
    worker::WorkerOutput,
};

/// Record printed by the worker on stdout, every field is optional.
/// Any status word is accepted.
#[derive(Debug, Deserialize)]
struct WorkerRecord {
    status: Option<TaskStatus>,
    message: Option<String>,
    file: Option<String>,
    output_path: Option<String>,
}

/// Turns a worker invocation into the result reported for `task`.
///
/// A failed invocation is always an error and its output is not decoded.
pub fn task_result(task: &Task, worker: &WorkerOutput) -> TaskResult {
    match &worker.outcome {
        Err(e) => TaskResult::error(
            task.file_string(),
            format!("Error: {e}. Output: {}", String::from_utf8_lossy(&worker.output)),
        ),
        Ok(()) => decode_output(&task.file_string(), &worker.output),
    }
}

/// Decodes the output of a successful invocation.
///
/// Output that is not a JSON record is still a success, carrying the raw
/// text as its message.
pub fn decode_output(file: &str, output: &[u8]) -> TaskResult {
    match parse_record(output) {
        Some(record) => TaskResult {
            status: record.status.unwrap_or_default(),
            message: record.message.unwrap_or_default(),
            file: record.file.unwrap_or_else(|| file.to_string()),
            output_path: record.output_path.filter(|p| !p.is_empty()),
        },
        None => TaskResult::success_raw(file, String::from_utf8_lossy(output)),
    }
}

fn parse_record(output: &[u8]) -> Option<WorkerRecord> {
    // only objects, serde would also accept a sequence for a struct
    let Ok(Json::Object(map)) = serde_json::from_slice::<Json>(output) else {
        return None;
    };
    serde_json::from_value(Json::Object(map)).ok()
}
