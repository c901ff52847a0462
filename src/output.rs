//! Structured output writer supporting JSON Lines and human-readable modes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

use crate::config::Direction;
use crate::core::classify::FormatOrigin;
use crate::core::job::{BatchReport, JobOutcome, JobReport};
use crate::stats::TransferStats;

/// Output mode for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// One JSON line per job
#[derive(Debug, Serialize)]
pub struct JobRecord<'a> {
    pub record: &'static str,
    pub timestamp: DateTime<Utc>,
    pub index: usize,
    pub direction: Direction,
    pub local_path: String,
    pub remote_name: &'a str,
    pub transmission_format: &'static str,
    pub file_format: &'static str,
    pub format_origin: FormatOrigin,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_secs: f64,
    pub stats: &'a TransferStats,
}

impl<'a> JobRecord<'a> {
    pub fn from_report(report: &'a JobReport) -> Self {
        let job = &report.job;
        let error = report.outcome.error();
        Self {
            record: "job",
            timestamp: Utc::now(),
            index: job.index,
            direction: job.direction,
            local_path: job.local_path.display().to_string(),
            remote_name: &job.remote_name,
            transmission_format: job.transmission.as_str(),
            file_format: job.file_format.as_str(),
            format_origin: job.format_origin,
            outcome: report.outcome.label(),
            error_kind: error.map(|e| e.kind()),
            error: error.map(|e| sanitize_error(&e.to_string())),
            elapsed_secs: report.elapsed.as_secs_f64(),
            stats: &report.stats,
        }
    }
}

/// Closing JSON line
#[derive(Debug, Serialize)]
pub struct BatchRecord {
    pub record: &'static str,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub simulated: usize,
    pub file_bytes: usize,
    pub transmitted_bytes: usize,
    pub elapsed_secs: f64,
    pub exit_code: i32,
}

impl BatchRecord {
    pub fn from_batch(batch: &BatchReport) -> Self {
        Self {
            record: "batch",
            timestamp: Utc::now(),
            direction: batch.direction,
            jobs: batch.jobs.len(),
            succeeded: batch.succeeded(),
            failed: batch.failed(),
            simulated: batch.simulated(),
            file_bytes: batch.file_bytes(),
            transmitted_bytes: batch.transmitted_bytes(),
            elapsed_secs: batch.elapsed.as_secs_f64(),
            exit_code: batch.exit_code(),
        }
    }
}

/// Structured output writer that supports both human-readable and JSON output
#[derive(Debug, Clone)]
pub struct OutputWriter {
    pub mode: OutputMode,
    /// Channel name used in human reports (device path or "clipboard")
    pub port: Option<String>,
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl OutputWriter {
    pub fn new(json: bool, port: Option<String>) -> Self {
        Self {
            mode: if json { OutputMode::Json } else { OutputMode::Human },
            port,
        }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Headline and statistics block for a finished job
    pub fn human_report(&self, report: &JobReport, total: usize) -> Vec<String> {
        let job = &report.job;
        let format = job.transmission.as_str();
        let (noun, preposition, subject) = match job.direction {
            Direction::Send => ("transmission", "to", job.remote_name.clone()),
            Direction::Receive => ("reception", "from", job.local_path.display().to_string()),
        };
        let verb = match &report.outcome {
            JobOutcome::Failed(_) => "failed after",
            _ => "completed in",
        };

        let mut headline = match (&report.outcome, &self.port) {
            (JobOutcome::Simulated, _) | (_, None) => {
                format!("Simulated {} {} of {}", format, noun, subject)
            }
            (_, Some(port)) => {
                format!("{} {} of {} {} {}", capitalize(format), noun, subject, preposition, port)
            }
        };
        headline.push_str(&format!(
            " ({}/{}) {} {:.3} seconds.",
            job.index,
            total,
            verb,
            report.elapsed.as_secs_f64()
        ));

        let specified = match job.format_origin {
            FormatOrigin::Specified | FormatOrigin::Forced => job.file_format.as_str(),
            _ => "inferred",
        };
        let mut lines = vec![
            headline,
            format!("\tFile format: {} (specified as {})", job.file_format, specified),
        ];
        if let Some(e) = report.outcome.error() {
            lines.push(format!("\tError ({}): {}", e.kind(), sanitize_error(&e.to_string())));
        }
        lines.extend(
            report
                .stats
                .report_lines(job.transmission, job.file_format)
                .into_iter()
                .map(|l| format!("\t{}", l)),
        );
        lines
    }

    /// Emit one finished job
    pub fn job_report(&self, report: &JobReport, total: usize) {
        match self.mode {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&JobRecord::from_report(report)) {
                    println!("{}", json);
                }
            }
            OutputMode::Human => {
                let stderr = io::stderr();
                let mut err = stderr.lock();
                let _ = writeln!(err);
                for line in self.human_report(report, total) {
                    let _ = writeln!(err, "{}", line);
                }
            }
        }
    }

    /// Emit every job, then the batch summary
    pub fn batch_report(&self, batch: &BatchReport) {
        let total = batch.jobs.len();
        for report in &batch.jobs {
            self.job_report(report, total);
        }
        match self.mode {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&BatchRecord::from_batch(batch)) {
                    println!("{}", json);
                }
            }
            OutputMode::Human => {
                if total > 1 || !batch.is_success() {
                    eprintln!("\n{}", crate::cli_style::batch_summary_table(batch));
                }
            }
        }
    }

    /// Print an info message (suppressed in JSON mode)
    pub fn info(&self, msg: &str) {
        if !self.is_json() {
            crate::cli_style::print_info(msg);
        }
    }
}

/// Sanitize error messages by collapsing whitespace
pub fn sanitize_error(msg: &str) -> String {
    msg.replace(['\n', '\t', '\r'], " ")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}
