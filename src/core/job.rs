/*!
 * Transfer jobs and their reports
 */

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Direction, FileFormat, TransmissionFormat};
use crate::core::classify::FormatOrigin;
use crate::core::newline::{NewlineConvention, NewlineSet};
use crate::error::{XferError, EXIT_FATAL, EXIT_SUCCESS};
use crate::stats::TransferStats;

/// One file transfer unit; immutable once the transfer starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// 1-based position in the batch
    pub index: usize,
    /// File read when sending, written when receiving
    pub local_path: PathBuf,
    pub remote_name: String,
    pub direction: Direction,
    pub transmission: TransmissionFormat,
    pub file_format: FileFormat,
    pub format_origin: FormatOrigin,
    pub user: u8,
    /// Resolved for `direction`; empty disables conversion
    pub sources: NewlineSet,
    pub target: NewlineConvention,
}

impl TransferJob {
    pub fn is_text(&self) -> bool {
        self.file_format == FileFormat::Text
    }

    /// Newline written into the payload. ED input lines end with a bare CR.
    pub fn effective_target(&self) -> NewlineConvention {
        match (self.direction, self.transmission) {
            (Direction::Send, TransmissionFormat::CpmPlaintext) => NewlineConvention::Cr,
            _ => self.target,
        }
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Completed,
    /// No remote was connected; commands were shown only
    Simulated,
    Failed(XferError),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, JobOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&XferError> {
        match self {
            JobOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Simulated => "simulated",
            JobOutcome::Failed(_) => "failed",
        }
    }
}

/// Everything known about a job after it ran
#[derive(Debug)]
pub struct JobReport {
    pub job: TransferJob,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
    pub stats: TransferStats,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Result of a whole run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub direction: Direction,
    pub jobs: Vec<JobReport>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.jobs.len() - self.succeeded()
    }

    pub fn simulated(&self) -> usize {
        self.jobs
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::Simulated))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Bytes written to the transport across all jobs
    pub fn transmitted_bytes(&self) -> usize {
        self.jobs.iter().map(|r| r.stats.transmitted_bytes).sum()
    }

    pub fn file_bytes(&self) -> usize {
        self.jobs
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.stats.file_bytes)
            .sum()
    }

    pub fn errors(&self) -> impl Iterator<Item = (&JobReport, &XferError)> {
        self.jobs
            .iter()
            .filter_map(|r| r.outcome.error().map(|e| (r, e)))
    }

    /// Process exit code: a lost transport outranks every per-job failure
    pub fn exit_code(&self) -> i32 {
        let mut code = EXIT_SUCCESS;
        for (_, error) in self.errors() {
            if error.is_fatal() {
                return EXIT_FATAL;
            }
            code = code.max(error.exit_code());
        }
        code
    }
}
