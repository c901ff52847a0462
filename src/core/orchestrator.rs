/*!
 * Job orchestration
 *
 * Turns the requested names into jobs, then runs them one after another over
 * a single transport. A failed job never stops the batch unless the transport
 * itself is gone, in which case the remaining jobs fail fast.
 */

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Direction, TransferConfig, TransmissionFormat};
use crate::core::classify::{classify_with_origin, ClassifyOptions, CONTENT_SNIFF_LEN};
use crate::core::job::{BatchReport, JobOutcome, JobReport, TransferJob};
use crate::core::names::{self, AcceptSuggestion, RenamePrompt};
use crate::core::newline::NewlineSet;
use crate::core::pacing::CharPacer;
use crate::core::progress::{ProgressEvent, ProgressPublisher};
use crate::core::session::Session;
use crate::core::transfer::{perform_transfer, TransferContext};
use crate::error::{Result, XferError};
use crate::stats::TransferStats;
use crate::transport::Transport;

/// A name as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Local path when sending, remote name when receiving
    pub spec: String,
    /// Receive only: expand wildcards through a remote directory listing
    pub expand_remote: bool,
}

impl JobRequest {
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            expand_remote: false,
        }
    }

    pub fn remote_pattern(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            expand_remote: true,
        }
    }
}

/// A job ready to run, or one that already failed while being planned
#[derive(Debug)]
pub struct PlannedJob {
    pub job: TransferJob,
    pub rejected: Option<XferError>,
}

pub struct Orchestrator<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    config: &'a TransferConfig,
    pacer: CharPacer,
    progress: ProgressPublisher,
    prompt: Box<dyn RenamePrompt + 'a>,
}

impl<'a, T: Transport + ?Sized> Orchestrator<'a, T> {
    pub fn new(config: &'a TransferConfig, transport: &'a mut T) -> Self {
        Self {
            transport,
            config,
            pacer: CharPacer::new(config.char_delay()),
            progress: ProgressPublisher::noop(),
            prompt: Box::new(AcceptSuggestion),
        }
    }

    pub fn with_progress(mut self, progress: ProgressPublisher) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_rename_prompt(mut self, prompt: Box<dyn RenamePrompt + 'a>) -> Self {
        self.prompt = prompt;
        self
    }

    fn transmission(&self) -> TransmissionFormat {
        self.config.transmission_format
    }

    fn build_job(
        &self,
        direction: Direction,
        local_path: PathBuf,
        remote_name: String,
        content: Option<&[u8]>,
    ) -> TransferJob {
        let classify_name = match direction {
            Direction::Send => local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Direction::Receive => remote_name.clone(),
        };
        let opts = ClassifyOptions {
            transmission: self.transmission(),
            override_format: self.config.file_format,
            direction,
            table: &self.config.extensions,
        };
        let (file_format, format_origin) = classify_with_origin(&classify_name, content, &opts);
        TransferJob {
            index: 0,
            local_path,
            remote_name,
            direction,
            transmission: self.transmission(),
            file_format,
            format_origin,
            user: self.config.user,
            sources: NewlineSet::resolve(&self.config.source_newlines, direction),
            target: self.config.target_newline.resolve_target(direction),
        }
    }

    fn plan_send(&mut self, request: &JobRequest) -> PlannedJob {
        let local_path = PathBuf::from(&request.spec);
        let head = read_head(&local_path);
        let resolved = names::resolve_remote_name(&local_path, self.prompt.as_mut());
        match resolved {
            Ok(resolved) => {
                if resolved.renamed {
                    info!("{} will be sent as {}", local_path.display(), resolved.name);
                }
                let job = self.build_job(Direction::Send, local_path, resolved.name, head.as_deref());
                PlannedJob { job, rejected: None }
            }
            Err(e) => {
                let job =
                    self.build_job(Direction::Send, local_path, request.spec.clone(), head.as_deref());
                PlannedJob {
                    job,
                    rejected: Some(e),
                }
            }
        }
    }

    fn receive_job(&self, remote_name: String) -> PlannedJob {
        let local = self
            .config
            .output_dir()
            .join(names::local_name_for_remote(&remote_name));
        PlannedJob {
            job: self.build_job(Direction::Receive, local, remote_name, None),
            rejected: None,
        }
    }

    /// Names a receive request stands for
    fn expand_remote(&mut self, pattern: &str) -> Result<Vec<String>> {
        // LIST has no directory to consult
        if self.transmission() == TransmissionFormat::BasicPlaintext {
            return Ok(vec![names::placeholder_expansion(pattern)]);
        }
        let timing = self.config.timing();
        let listing = {
            let mut session = Session::new(&mut *self.transport, &self.pacer, timing);
            session.list_directory(pattern, self.config.user)
        };
        self.transport.release()?;
        let listing = listing?;
        if listing.is_empty() {
            return Err(XferError::RemoteNotFound(pattern.to_string()));
        }
        debug!("{} expanded to {} names", pattern, listing.len());
        Ok(listing.qualified_names())
    }

    fn plan_receive(&mut self, request: &JobRequest) -> Vec<PlannedJob> {
        let spec = match self.transmission() {
            TransmissionFormat::BasicPlaintext => request.spec.clone(),
            _ => request.spec.to_ascii_uppercase(),
        };
        if !(request.expand_remote && names::has_wildcards(&spec)) {
            return vec![self.receive_job(spec)];
        }
        match self.expand_remote(&spec) {
            Ok(found) => found.into_iter().map(|name| self.receive_job(name)).collect(),
            Err(e) => {
                let mut planned = self.receive_job(names::placeholder_expansion(&spec));
                planned.job.remote_name = spec;
                planned.rejected = Some(e);
                vec![planned]
            }
        }
    }

    /// Resolve names, expand remote patterns and classify every file
    pub fn plan(&mut self, direction: Direction, requests: &[JobRequest]) -> Vec<PlannedJob> {
        let mut planned = Vec::new();
        for request in requests {
            match direction {
                Direction::Send => planned.push(self.plan_send(request)),
                Direction::Receive => planned.extend(self.plan_receive(request)),
            }
        }
        for (i, p) in planned.iter_mut().enumerate() {
            p.job.index = i + 1;
        }
        planned
    }

    /// Run every request in order and collect the reports
    pub fn run(&mut self, direction: Direction, requests: &[JobRequest]) -> BatchReport {
        let started = Instant::now();
        let planned = self.plan(direction, requests);
        let total = planned.len();
        let ctx = TransferContext {
            pacer: &self.pacer,
            timing: self.config.timing(),
            checksum: self.config.checksum,
        };
        let file_delay = self.config.file_delay();

        let mut reports = Vec::with_capacity(total);
        let mut lost_transport: Option<String> = None;

        for PlannedJob { job, rejected } in planned {
            self.progress.publish(ProgressEvent::job_start(
                job.index,
                total,
                direction,
                job.local_path.clone(),
                job.remote_name.clone(),
            ));

            let job_started = Instant::now();
            let mut stats = TransferStats::default();
            let outcome = if let Some(e) = rejected {
                JobOutcome::Failed(e)
            } else if let Some(reason) = lost_transport.clone() {
                JobOutcome::Failed(XferError::TransportUnusable(reason))
            } else if !self.transport.is_usable() {
                JobOutcome::Failed(XferError::TransportUnusable(
                    "channel closed before the job started".to_string(),
                ))
            } else {
                if job.index > 1 && !file_delay.is_zero() {
                    thread::sleep(file_delay);
                }
                info!(
                    "Job {}/{}: {} {} <-> {}",
                    job.index,
                    total,
                    direction,
                    job.local_path.display(),
                    job.remote_name
                );
                let result = perform_transfer(&job, &ctx, &mut *self.transport, &mut stats);
                if let Err(e) = self.transport.release() {
                    warn!("Releasing the transport failed: {}", e);
                    if e.is_fatal() {
                        lost_transport = Some(e.to_string());
                    }
                }
                match result {
                    Ok(outcome) => outcome,
                    Err(e) => JobOutcome::Failed(e),
                }
            };

            let elapsed = job_started.elapsed();
            match &outcome {
                JobOutcome::Failed(e) => {
                    warn!("Job {} ({}) failed: {}", job.index, job.remote_name, e);
                    if e.is_fatal() && lost_transport.is_none() {
                        lost_transport = Some(e.to_string());
                    }
                    self.progress.publish(ProgressEvent::job_failed(
                        job.index,
                        job.remote_name.clone(),
                        e.kind(),
                        e.to_string(),
                        stats.transmitted_bytes,
                    ));
                }
                done => {
                    info!("Job {} ({}) {} in {:?}", job.index, job.remote_name, done.label(), elapsed);
                    self.progress.publish(ProgressEvent::job_complete(
                        job.index,
                        job.remote_name.clone(),
                        stats.file_bytes,
                        stats.transmitted_bytes,
                        elapsed.as_millis() as u64,
                        matches!(done, JobOutcome::Simulated),
                    ));
                }
            }

            reports.push(JobReport {
                job,
                outcome,
                elapsed,
                stats,
            });
        }

        let batch = BatchReport {
            direction,
            jobs: reports,
            elapsed: started.elapsed(),
        };
        self.progress.publish(ProgressEvent::batch_complete(
            batch.succeeded(),
            batch.failed(),
            batch.file_bytes(),
            batch.elapsed.as_millis() as u64,
        ));
        batch
    }
}

/// The first bytes of a local file, for content sniffing
fn read_head(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut head = Vec::with_capacity(CONTENT_SNIFF_LEN);
    file.take(CONTENT_SNIFF_LEN as u64).read_to_end(&mut head).ok()?;
    Some(head)
}
