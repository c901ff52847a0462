/*!
 * rcxfer - serial file transfer for CP/M and BASIC retrocomputers
 *
 * Moves files between a host and an 8-bit remote over a byte-oriented link:
 * - Checksummed hex package protocol (DOWNLOAD.COM / UPLOAD.COM)
 * - CP/M ED and TYPE automation for plain text
 * - BASIC interpreter line entry and LIST capture
 * - Byte-exact newline conversion with statistics
 * - 8.3 name resolution and remote wildcard expansion
 *
 * Version: 0.3.0
 */

pub mod cli_progress;
pub mod cli_style;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod output;
pub mod stats;
pub mod transport;

// Re-export commonly used types
pub use config::{Direction, FileFormat, TransferConfig, TransmissionFormat};
pub use core::{BatchReport, JobOutcome, JobReport, JobRequest, Orchestrator, TransferJob};
pub use error::{Result, XferError};
pub use stats::TransferStats;
pub use transport::{ChannelMode, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
