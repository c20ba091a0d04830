//! Bounded-concurrency batch dispatch of EPUB jobs to an external worker.
//!
//! A [`Batch`](task::Batch) runs one worker process per file, at most
//! [`MAX_WORKERS`](run::MAX_WORKERS) at a time, and reports every result and
//! progress step through an [`EventEmitter`](events::EventEmitter).

pub mod cli;
pub mod events;
pub mod input;
pub mod log_file;
pub mod run;
pub mod task;
pub mod worker;

pub use events::{ChannelEmitter, Event, EventEmitter};
pub use run::{BatchError, BatchHandle, BatchSummary, DispatchConfig, Dispatcher};
pub use task::{Batch, Progress, Task, TaskResult, TaskStatus};
