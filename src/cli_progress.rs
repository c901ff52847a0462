/*!
 * CLI progress renderer
 *
 * Subscribes to progress events and announces each job on stderr. When wire
 * echo is off, a spinner shows that a long transfer is still running.
 */

use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::cli_style::{format_bytes, Icons, Theme};
use crate::config::{Direction, TransmissionFormat};
use crate::core::progress::{ProgressEvent, ProgressSubscriber};

/// Line announcing a job, in the console's established wording
pub fn job_banner(
    index: usize,
    total: usize,
    direction: Direction,
    transmission: TransmissionFormat,
    local_path: &Path,
    remote_name: &str,
) -> String {
    let remote = match transmission {
        TransmissionFormat::BasicPlaintext => "BASIC Interpreter",
        _ => remote_name,
    };
    match direction {
        Direction::Send => format!(
            "Uploading file {}/{}: {} -> {}",
            index,
            total,
            local_path.display(),
            remote
        ),
        Direction::Receive => format!(
            "Downloading file {}/{}: {} -> {}",
            index,
            total,
            remote,
            local_path.display()
        ),
    }
}

pub struct CliProgressRenderer {
    subscriber: ProgressSubscriber,
    transmission: TransmissionFormat,
    spinner: bool,
    verbose: bool,
    active: Option<ProgressBar>,
}

impl CliProgressRenderer {
    pub fn new(subscriber: ProgressSubscriber, transmission: TransmissionFormat) -> Self {
        Self {
            subscriber,
            transmission,
            spinner: false,
            verbose: false,
            active: None,
        }
    }

    /// Show a spinner while each job runs
    pub fn with_spinner(mut self, spinner: bool) -> Self {
        self.spinner = spinner;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Render until every publisher is dropped
    pub fn run(mut self) -> io::Result<()> {
        while let Some(event) = self.subscriber.recv() {
            self.handle_event(event);
        }
        self.finish_spinner();
        Ok(())
    }

    /// Spawn the renderer in a background thread
    pub fn spawn(self) -> thread::JoinHandle<io::Result<()>> {
        thread::spawn(move || self.run())
    }

    fn finish_spinner(&mut self) {
        if let Some(bar) = self.active.take() {
            bar.finish_and_clear();
        }
    }

    fn start_spinner(&mut self, remote_name: &str) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(remote_name.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        self.active = Some(bar);
    }

    fn handle_event(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::JobStart {
                index,
                total,
                direction,
                local_path,
                remote_name,
                ..
            } => {
                eprintln!(
                    "\n{}",
                    job_banner(index, total, direction, self.transmission, &local_path, &remote_name)
                );
                if self.spinner {
                    self.start_spinner(&remote_name);
                }
            }

            ProgressEvent::JobComplete {
                remote_name,
                transmitted_bytes,
                duration_ms,
                simulated,
                ..
            } => {
                self.finish_spinner();
                if self.verbose {
                    let icon = if simulated { Icons::SIMULATED } else { Icons::SUCCESS };
                    eprintln!(
                        "{} {}: {} on the wire in {}ms",
                        Theme::success(icon),
                        remote_name,
                        format_bytes(transmitted_bytes as u64),
                        duration_ms
                    );
                }
            }

            ProgressEvent::JobFailed {
                remote_name,
                kind,
                error,
                ..
            } => {
                self.finish_spinner();
                eprintln!(
                    "{} {} ({}): {}",
                    Theme::error(Icons::ERROR),
                    remote_name,
                    kind,
                    error
                );
            }

            ProgressEvent::BatchComplete {
                jobs_succeeded,
                jobs_failed,
                duration_ms,
                ..
            } => {
                self.finish_spinner();
                if self.verbose {
                    eprintln!(
                        "{} {} succeeded, {} failed in {}ms",
                        Theme::primary(Icons::INFO),
                        jobs_succeeded,
                        jobs_failed,
                        duration_ms
                    );
                }
            }
        }
    }
}
