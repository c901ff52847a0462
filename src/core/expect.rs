/*!
 * Awaiting remote responses
 *
 * An await is a suspend point with a deadline and a buffer that survives it:
 * bytes past the match stay in the buffer for the next step.
 */

use regex::bytes::Regex;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::error::{Result, XferError};
use crate::transport::Transport;

/// What a step waits for
#[derive(Clone)]
pub enum Pattern {
    Literal(Vec<u8>),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl AsRef<[u8]>) -> Self {
        Pattern::Literal(text.as_ref().to_vec())
    }

    pub fn regex(re: &str) -> Result<Self> {
        Regex::new(re)
            .map(Pattern::Regex)
            .map_err(|e| XferError::Config(format!("invalid pattern {:?}: {}", re, e)))
    }

    /// Byte range of the first match
    pub fn find(&self, haystack: &[u8]) -> Option<(usize, usize)> {
        match self {
            Pattern::Literal(needle) => {
                if needle.is_empty() {
                    return Some((0, 0));
                }
                haystack
                    .windows(needle.len())
                    .position(|w| w == needle.as_slice())
                    .map(|start| (start, start + needle.len()))
            }
            Pattern::Regex(re) => re.find(haystack).map(|m| (m.start(), m.end())),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// One await step
#[derive(Debug, Clone)]
pub struct Expectation {
    pub pattern: Pattern,
    pub timeout: Duration,
    /// Quiet period that must follow a match before it counts
    pub settle: Option<Duration>,
    /// Name used in timeout reports
    pub step: String,
}

impl Expectation {
    pub fn new(step: impl Into<String>, pattern: Pattern, timeout: Duration) -> Self {
        Self {
            pattern,
            timeout,
            settle: None,
            step: step.into(),
        }
    }

    pub fn settled(mut self, settle: Duration) -> Self {
        if !settle.is_zero() {
            self.settle = Some(settle);
        }
        self
    }
}

/// Accumulated remote output
#[derive(Debug, Default, Clone)]
pub struct ResponseBuffer {
    data: Vec<u8>,
    total: usize,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.total += bytes.len();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes received over the buffer's lifetime
    pub fn total_received(&self) -> usize {
        self.total
    }

    /// Remove and return everything up to `end`
    pub fn take_through(&mut self, end: usize) -> Vec<u8> {
        let end = end.min(self.data.len());
        self.data.drain(..end).collect()
    }

    pub fn take_all(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

/// Read until `expectation` matches, then return the buffered bytes through the match.
///
/// Fails with `SessionTimeout` when the deadline passes first. Transport errors
/// propagate unchanged.
pub fn await_pattern<T: Transport + ?Sized>(
    transport: &mut T,
    buffer: &mut ResponseBuffer,
    expectation: &Expectation,
    poll: Duration,
) -> Result<Vec<u8>> {
    let started = Instant::now();
    let deadline = started + expectation.timeout;

    loop {
        if let Some((_, end)) = expectation.pattern.find(buffer.as_bytes()) {
            match expectation.settle {
                Some(settle) => {
                    let more = transport.read_available(settle)?;
                    if more.is_empty() {
                        trace!("{} matched and settled", expectation.step);
                        return Ok(buffer.take_through(end));
                    }
                    buffer.extend(&more);
                    if Instant::now() < deadline {
                        continue;
                    }
                }
                None => {
                    trace!("{} matched", expectation.step);
                    return Ok(buffer.take_through(end));
                }
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(XferError::SessionTimeout {
                step: expectation.step.clone(),
                waited: now - started,
                received: buffer.total_received(),
            });
        }
        let chunk = transport.read_available(poll.min(deadline - now))?;
        buffer.extend(&chunk);
    }
}
