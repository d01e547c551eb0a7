pub mod config;
pub mod logging;

// Transfer engine
pub mod control;
mod downloader;
pub mod error;
pub mod events;
pub mod job;
mod monitor;
pub mod probe;
pub mod retry;
pub mod scheduler;
pub mod segmenter;
pub mod storage;
pub mod strategy;
mod supervisor;
pub mod url_model;

pub use config::{JobConfig, RdmConfig};
pub use error::TransferError;
pub use events::{EventSink, TransferEvent};
pub use job::{JobId, JobSnapshot, JobState};
pub use scheduler::Scheduler;
