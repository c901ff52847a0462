/*!
 * Transfer protocol engine
 */

pub mod classify;
pub mod expect;
pub mod job;
pub mod names;
pub mod newline;
pub mod orchestrator;
pub mod package;
pub mod pacing;
pub mod progress;
pub mod session;
pub mod transfer;

pub use job::{BatchReport, JobOutcome, JobReport, TransferJob};
pub use orchestrator::{JobRequest, Orchestrator, PlannedJob};
pub use transfer::{perform_transfer, TransferContext};
