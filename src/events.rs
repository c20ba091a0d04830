use serde_json::{Value as Json, json};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::task::{Progress, TaskResult};

/// Notifications sent to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FileDrop(Vec<String>),
    TaskLog(String),
    TaskResult(TaskResult),
    TaskProgress(Progress),
    /// Last event of a batch
    TaskComplete,
}

impl Event {
    /// Channel name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Event::FileDrop(_) => "file_drop",
            Event::TaskLog(_) => "task_log",
            Event::TaskResult(_) => "task_result",
            Event::TaskProgress(_) => "task_progress",
            Event::TaskComplete => "task_complete",
        }
    }

    pub fn payload(&self) -> Json {
        match self {
            Event::FileDrop(paths) => json!(paths),
            Event::TaskLog(text) => json!(text),
            Event::TaskResult(result) => json!(result),
            Event::TaskProgress(progress) => json!(progress),
            Event::TaskComplete => json!("done"),
        }
    }

    pub fn to_json(&self) -> Json {
        json!({ "event": self.name(), "payload": self.payload() })
    }
}

/// Output channel of the dispatcher.
///
/// Emitting is fire-and-forget: it must not block for long and it cannot fail.
pub trait EventEmitter: Send + Sync + 'static {
    fn emit(&self, event: Event);
}

impl<F> EventEmitter for F
where
    F: Fn(Event) + Send + Sync + 'static,
{
    fn emit(&self, event: Event) {
        self(event)
    }
}

/// Forwards events to an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelEmitter(UnboundedSender<Event>);

impl ChannelEmitter {
    pub fn new() -> (Self, UnboundedReceiver<Event>) {
        let (tx, rx) = unbounded_channel();
        (Self(tx), rx)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event: Event) {
        // nobody listening anymore is fine
        let _ = self.0.send(event);
    }
}
