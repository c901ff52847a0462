/*!
 * Session automaton: drives one job's conversation with the remote
 *
 * Each transmission format is a [`Flow`] variant. Commands are written with a
 * CRLF terminator; ED input lines end with a bare CR. Outside interactive
 * mode no await is performed, because nothing will answer.
 */

use regex::bytes::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::Direction;
use crate::core::expect::{await_pattern, Expectation, Pattern, ResponseBuffer};
use crate::core::names::{self, RemoteEntry, RemoteListing};
use crate::core::package::{self, ChecksumKind, PackageFrame, CPM_EOF};
use crate::core::pacing::CharPacer;
use crate::error::{Result, XferError};
use crate::transport::{ChannelMode, Transport};

/// Terminator for CCP and BASIC commands
pub const LINE_END: &[u8] = b"\r\n";

/// Line terminator inside ED's insert mode
pub const ED_LINE_END: &[u8] = b"\r";

static CPM_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\A|[\r\n])[A-P][0-9]{0,2}>\s*\z").unwrap());

static ED_PROMPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*[ ]*\z").unwrap());

static BASIC_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\A|[\r\n])(?:Ok[ ]*(?:\r\n|\r|\n)?|>)\z").unwrap());

static PACKAGE_ACK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?-u:\b)OK(?-u:\b)").unwrap());

static UPLOAD_REPLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:can't find)|:[0-9A-Fa-f\s]*>[0-9A-Fa-f]{4}").unwrap()
});

/// Deadlines for the different kinds of await
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Command prompts
    pub prompt: Duration,
    /// Acknowledgment after a payload (DOWNLOAD's OK, ED's save)
    pub ack: Duration,
    /// Whole TYPE / LIST / UPLOAD captures
    pub capture: Duration,
    /// Quiet period confirming an end-of-buffer prompt
    pub settle: Duration,
    /// Read granularity
    pub poll: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            prompt: Duration::from_secs(5),
            ack: Duration::from_secs(30),
            capture: Duration::from_secs(120),
            settle: Duration::from_millis(250),
            poll: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingPrompt { expected: String, buffered: usize },
    Streaming { remaining: usize },
    Complete,
    Failed(String),
}

/// The scripted conversation for one job
#[derive(Debug, Clone)]
pub enum Flow {
    PackageSend {
        remote_name: String,
        user: u8,
        frame: PackageFrame,
    },
    PackageReceive {
        remote_name: String,
        user: u8,
        checksum: ChecksumKind,
    },
    /// `content` already uses CR line separators
    CpmSend {
        remote_name: String,
        user: u8,
        content: Vec<u8>,
    },
    CpmReceive {
        remote_name: String,
        user: u8,
    },
    BasicSend {
        content: Vec<u8>,
    },
    BasicReceive,
}

impl Flow {
    pub fn name(&self) -> &'static str {
        match self {
            Flow::PackageSend { .. } => "package-send",
            Flow::PackageReceive { .. } => "package-receive",
            Flow::CpmSend { .. } => "cpm-send",
            Flow::CpmReceive { .. } => "cpm-receive",
            Flow::BasicSend { .. } => "basic-send",
            Flow::BasicReceive => "basic-receive",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Flow::PackageSend { .. } | Flow::CpmSend { .. } | Flow::BasicSend { .. } => {
                Direction::Send
            }
            _ => Direction::Receive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutput {
    Sent,
    /// Raw bytes as captured; clean-up happens in the caller
    Received(Vec<u8>),
    /// Commands were shown but no remote exists
    Simulated,
}

pub struct Session<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    pacer: &'a CharPacer,
    timing: SessionTiming,
    mode: ChannelMode,
    state: SessionState,
    transitions: Vec<SessionState>,
    buffer: ResponseBuffer,
    transmitted: usize,
}

impl<'a, T: Transport + ?Sized> Session<'a, T> {
    pub fn new(transport: &'a mut T, pacer: &'a CharPacer, timing: SessionTiming) -> Self {
        let mode = transport.mode();
        Self {
            transport,
            pacer,
            timing,
            mode,
            state: SessionState::Idle,
            transitions: vec![SessionState::Idle],
            buffer: ResponseBuffer::new(),
            transmitted: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Every state entered, in order
    pub fn transitions(&self) -> &[SessionState] {
        &self.transitions
    }

    /// Bytes written to the transport
    pub fn transmitted(&self) -> usize {
        self.transmitted
    }

    /// Bytes read from the transport
    pub fn received(&self) -> usize {
        self.buffer.total_received()
    }

    fn enter(&mut self, state: SessionState) {
        trace!("session state -> {:?}", state);
        self.transitions.push(state.clone());
        self.state = state;
    }

    /// Drive `flow` to `Complete` or `Failed`
    pub fn run(&mut self, flow: &Flow) -> Result<FlowOutput> {
        debug!("Running {} flow in {:?} mode", flow.name(), self.mode);
        let result = self.discard_pending().and_then(|_| match flow {
            Flow::PackageSend {
                remote_name,
                user,
                frame,
            } => self.package_send(remote_name, *user, frame),
            Flow::PackageReceive {
                remote_name,
                user,
                checksum,
            } => self.package_receive(remote_name, *user, *checksum),
            Flow::CpmSend {
                remote_name,
                user,
                content,
            } => self.cpm_send(remote_name, *user, content),
            Flow::CpmReceive { remote_name, user } => self.cpm_receive(remote_name, *user),
            Flow::BasicSend { content } => self.basic_send(content),
            Flow::BasicReceive => self.basic_receive(),
        });
        match &result {
            Ok(_) => self.enter(SessionState::Complete),
            Err(e) => self.enter(SessionState::Failed(e.to_string())),
        }
        result
    }

    /// List remote files matching `pattern`.
    ///
    /// Without a live remote the listing cannot be queried, so a single
    /// placeholder name stands in for the pattern.
    pub fn list_directory(&mut self, pattern: &str, user: u8) -> Result<RemoteListing> {
        if !self.mode.expects_responses() {
            return Ok(RemoteListing::from_entries(vec![RemoteEntry {
                drive: None,
                name: names::placeholder_expansion(pattern).to_ascii_uppercase(),
            }]));
        }
        self.discard_pending()?;
        self.command_and_prompt(&format!("USER {}", user))?;
        self.command(&format!("DIR {}", pattern.to_ascii_uppercase()))?;
        let response = self.await_cpm_prompt("DIR listing", self.timing.prompt)?;
        if names::reports_missing(&response) {
            return Ok(RemoteListing::default());
        }
        Ok(names::parse_listing(&response))
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.enter(SessionState::Streaming {
            remaining: bytes.len(),
        });
        self.pacer.send(&mut *self.transport, bytes)?;
        self.transmitted += bytes.len();
        Ok(())
    }

    fn command(&mut self, text: &str) -> Result<()> {
        let mut line = Vec::with_capacity(text.len() + LINE_END.len());
        line.extend_from_slice(text.as_bytes());
        line.extend_from_slice(LINE_END);
        debug!("-> {}", text);
        self.send(&line)
    }

    fn expect(&mut self, expectation: Expectation) -> Result<Vec<u8>> {
        if !self.mode.expects_responses() {
            return Ok(Vec::new());
        }
        self.enter(SessionState::AwaitingPrompt {
            expected: format!("{:?}", expectation.pattern),
            buffered: self.buffer.len(),
        });
        await_pattern(
            &mut *self.transport,
            &mut self.buffer,
            &expectation,
            self.timing.poll,
        )
    }

    fn await_cpm_prompt(&mut self, step: &str, timeout: Duration) -> Result<Vec<u8>> {
        self.expect(
            Expectation::new(step, Pattern::Regex(CPM_PROMPT.clone()), timeout)
                .settled(self.timing.settle),
        )
    }

    fn command_and_prompt(&mut self, text: &str) -> Result<Vec<u8>> {
        self.command(text)?;
        self.await_cpm_prompt(&format!("prompt after {}", text), self.timing.prompt)
    }

    /// Best effort: wait for the CCP prompt, tolerating its absence
    fn drain_prompt(&mut self) -> Result<()> {
        match self.await_cpm_prompt("trailing prompt", self.timing.prompt) {
            Err(XferError::SessionTimeout { .. }) => {
                debug!("No trailing prompt; continuing");
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    /// Drop input that arrived before this step
    fn discard_pending(&mut self) -> Result<()> {
        if self.mode.expects_responses() {
            let stale = self.transport.read_available(Duration::ZERO)?;
            if !stale.is_empty() {
                trace!("Discarding {} stale bytes", stale.len());
            }
            self.buffer.extend(&stale);
            self.buffer.take_all();
        }
        Ok(())
    }

    /// The pasted clipboard content, read once
    fn capture_pasted(&mut self) -> Result<Vec<u8>> {
        let pasted = self.transport.read_available(self.timing.poll)?;
        self.buffer.extend(&pasted);
        Ok(self.buffer.take_all())
    }

    fn confirm_exists(&mut self, remote_name: &str) -> Result<()> {
        self.command(&format!("DIR {}", remote_name))?;
        let response = self.await_cpm_prompt("DIR listing", self.timing.prompt)?;
        if names::reports_missing(&response) {
            return Err(XferError::RemoteNotFound(remote_name.to_string()));
        }
        Ok(())
    }

    fn package_send(&mut self, remote_name: &str, user: u8, frame: &PackageFrame) -> Result<FlowOutput> {
        self.command(&format!("A:DOWNLOAD {}", remote_name))?;
        self.command(&format!("U{}", user))?;
        if self.mode.expects_responses() {
            self.skip_user_echo(user)?;
        }
        self.send(&frame.wire_payload())?;
        if self.mode.expects_responses() {
            self.expect(Expectation::new(
                "package acknowledgment",
                Pattern::Regex(PACKAGE_ACK.clone()),
                self.timing.ack,
            ))?;
            self.drain_prompt()?;
        }
        Ok(FlowOutput::Sent)
    }

    /// Consume the echoed command lines up to `U<n>` so that `OK` in an
    /// echoed file name cannot pass for the acknowledgment
    fn skip_user_echo(&mut self, user: u8) -> Result<()> {
        let echo_end = Pattern::regex(&format!(r"(?:\A|[\r\n])U{}[ ]*\r?\n", user))?;
        match self.expect(Expectation::new("user area echo", echo_end, self.timing.prompt)) {
            Err(XferError::SessionTimeout { .. }) => debug!("No echo of user area line"),
            other => {
                other?;
            }
        }
        let rest = self.buffer.take_all();
        if !rest.is_empty() {
            trace!("Discarding {} bytes ahead of the package", rest.len());
        }
        Ok(())
    }

    fn package_receive(
        &mut self,
        remote_name: &str,
        user: u8,
        checksum: ChecksumKind,
    ) -> Result<FlowOutput> {
        match self.mode {
            ChannelMode::Simulated => {
                self.command(&format!("USER {}", user))?;
                self.command(&format!("DIR {}", remote_name))?;
                self.command(&format!("A:UPLOAD {}", remote_name))?;
                Ok(FlowOutput::Simulated)
            }
            ChannelMode::Clipboard => {
                let capture = self.capture_pasted()?;
                decode_capture(&capture, remote_name, checksum).map(FlowOutput::Received)
            }
            ChannelMode::Interactive => {
                self.command_and_prompt(&format!("USER {}", user))?;
                self.confirm_exists(remote_name)?;
                self.command(&format!("A:UPLOAD {}", remote_name))?;
                let capture = self.expect(Expectation::new(
                    "package frame",
                    Pattern::Regex(UPLOAD_REPLY.clone()),
                    self.timing.capture,
                ))?;
                let payload = decode_capture(&capture, remote_name, checksum)?;
                self.drain_prompt()?;
                Ok(FlowOutput::Received(payload))
            }
        }
    }

    fn cpm_send(&mut self, remote_name: &str, user: u8, content: &[u8]) -> Result<FlowOutput> {
        let stem = remote_name.split('.').next().unwrap_or(remote_name);
        let erase_backup = format!("ERA {}.BAK", stem);

        self.command_and_prompt(&format!("USER {}", user))?;
        // A missing backup only produces "No File"; the prompt still follows
        self.command_and_prompt(&erase_backup)?;
        // ED appends to an existing file
        self.command_and_prompt(&format!("ERA {}", remote_name))?;
        self.command(&format!("C:ED {}", remote_name))?;
        self.expect(
            Expectation::new("ED prompt", Pattern::Regex(ED_PROMPT.clone()), self.timing.prompt)
                .settled(self.timing.settle),
        )?;

        let mut insert = b"i".to_vec();
        insert.extend_from_slice(ED_LINE_END);
        self.send(&insert)?;
        self.send(content)?;

        let mut finish = vec![CPM_EOF, b'E'];
        finish.extend_from_slice(ED_LINE_END);
        self.send(&finish)?;
        self.await_cpm_prompt("ED save", self.timing.ack)?;

        self.command_and_prompt(&erase_backup)?;
        Ok(FlowOutput::Sent)
    }

    fn cpm_receive(&mut self, remote_name: &str, user: u8) -> Result<FlowOutput> {
        match self.mode {
            ChannelMode::Simulated => {
                self.command(&format!("USER {}", user))?;
                self.command(&format!("DIR {}", remote_name))?;
                self.command(&format!("TYPE {}", remote_name))?;
                Ok(FlowOutput::Simulated)
            }
            ChannelMode::Clipboard => Ok(FlowOutput::Received(self.capture_pasted()?)),
            ChannelMode::Interactive => {
                self.command_and_prompt(&format!("USER {}", user))?;
                self.confirm_exists(remote_name)?;
                self.command(&format!("TYPE {}", remote_name))?;
                let capture = self.await_cpm_prompt("TYPE capture", self.timing.capture)?;
                Ok(FlowOutput::Received(capture))
            }
        }
    }

    fn basic_send(&mut self, content: &[u8]) -> Result<FlowOutput> {
        self.send(content)?;
        Ok(FlowOutput::Sent)
    }

    fn basic_receive(&mut self) -> Result<FlowOutput> {
        match self.mode {
            ChannelMode::Simulated => {
                self.command("LIST")?;
                Ok(FlowOutput::Simulated)
            }
            ChannelMode::Clipboard => Ok(FlowOutput::Received(self.capture_pasted()?)),
            ChannelMode::Interactive => {
                self.command("LIST")?;
                let capture = self.expect(
                    Expectation::new(
                        "LIST capture",
                        Pattern::Regex(BASIC_PROMPT.clone()),
                        self.timing.capture,
                    )
                    .settled(self.timing.settle),
                )?;
                Ok(FlowOutput::Received(capture))
            }
        }
    }
}

/// Locate and verify the package frame in an UPLOAD reply
pub fn decode_capture(capture: &[u8], remote_name: &str, checksum: ChecksumKind) -> Result<Vec<u8>> {
    match package::find_frame(capture) {
        Some(raw) => package::decode_with(&raw.hex, raw.checksum, checksum.strategy()),
        None if names::reports_missing(capture) => {
            Err(XferError::RemoteNotFound(remote_name.to_string()))
        }
        None => Err(XferError::MalformedFrame(format!(
            "no package frame in {} bytes of input",
            capture.len()
        ))),
    }
}

/// Drop the first line when it echoes `command`
fn strip_echo_line<'b>(raw: &'b [u8], command: &str) -> &'b [u8] {
    let line_end = raw.iter().position(|b| *b == b'\n');
    let line = String::from_utf8_lossy(&raw[..line_end.unwrap_or(raw.len())]).into_owned();
    let line = line.trim();
    let echoed = without_prompt(line).trim().eq_ignore_ascii_case(command.trim());
    match (echoed, line_end) {
        (true, Some(end)) => &raw[end + 1..],
        (true, None) => &[],
        (false, _) => raw,
    }
}

/// Remove a leading `>` or CP/M drive prompt such as `A>` or `B12>`
fn without_prompt(line: &str) -> &str {
    let Some(gt) = line.find('>') else {
        return line;
    };
    let prefix = line[..gt].as_bytes();
    let is_prompt = match prefix.split_first() {
        None => true,
        Some((drive, user)) => {
            (b'A'..=b'P').contains(drive)
                && user.len() <= 2
                && user.iter().all(u8::is_ascii_digit)
        }
    };
    if is_prompt {
        &line[gt + 1..]
    } else {
        line
    }
}

/// Cut a trailing prompt; returns the body and whether a prompt was found
fn strip_trailing_prompt<'b>(raw: &'b [u8], prompt: &Regex) -> (&'b [u8], bool) {
    match prompt.find(raw) {
        Some(m) => {
            let mut cut = m.start();
            if matches!(raw.get(cut), Some(b'\r') | Some(b'\n')) {
                cut += 1;
            }
            (&raw[..cut], true)
        }
        None => (raw, false),
    }
}

fn strip_one_newline(body: &[u8]) -> &[u8] {
    if body.ends_with(b"\r\n") {
        &body[..body.len() - 2]
    } else if body.ends_with(b"\n") || body.ends_with(b"\r") {
        &body[..body.len() - 1]
    } else {
        body
    }
}

/// File content from a `TYPE` capture: no echo, prompt, CCP newline or padding
pub fn clean_cpm_capture(raw: &[u8], command: &str) -> Vec<u8> {
    let body = strip_echo_line(raw, command);
    let (body, had_prompt) = strip_trailing_prompt(body, &CPM_PROMPT);
    let body = if had_prompt { strip_one_newline(body) } else { body };
    package::strip_padding(body).to_vec()
}

/// Program text from a `LIST` capture: no echo, no `Ok`/`>` prompt, no padding
pub fn clean_basic_capture(raw: &[u8], command: &str) -> Vec<u8> {
    let body = strip_echo_line(raw, command);
    let (body, _) = strip_trailing_prompt(body, &BASIC_PROMPT);
    package::strip_padding(body).to_vec()
}
