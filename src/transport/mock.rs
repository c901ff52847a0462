/*!
 * Scripted remote for tests and dry runs
 *
 * Rules fire in order. Each rule waits for its trigger to appear in the bytes
 * written since the previous rule fired, then queues its response for reading.
 */

use std::collections::VecDeque;
use std::io;
use std::thread;
use std::time::Duration;

use super::{ChannelMode, Transport};
use crate::error::{Result, XferError};

#[derive(Debug, Clone)]
struct Rule {
    trigger: Vec<u8>,
    response: Vec<u8>,
}

#[derive(Debug)]
pub struct ScriptedTransport {
    rules: VecDeque<Rule>,
    written: Vec<u8>,
    watch_from: usize,
    inbox: Vec<u8>,
    read_chunk: Option<usize>,
    close_on: Option<Vec<u8>>,
    closed: bool,
    failed_writes: usize,
    releases: usize,
    mode: ChannelMode,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            rules: VecDeque::new(),
            written: Vec::new(),
            watch_from: 0,
            inbox: Vec::new(),
            read_chunk: None,
            close_on: None,
            closed: false,
            failed_writes: 0,
            releases: 0,
            mode: ChannelMode::Interactive,
        }
    }

    /// Answer the next occurrence of `trigger` with `response`
    pub fn on(mut self, trigger: impl AsRef<[u8]>, response: impl AsRef<[u8]>) -> Self {
        self.rules.push_back(Rule {
            trigger: trigger.as_ref().to_vec(),
            response: response.as_ref().to_vec(),
        });
        self
    }

    /// Bytes waiting before anything is written
    pub fn with_pending(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.inbox.extend_from_slice(bytes.as_ref());
        self
    }

    /// Deliver at most `n` bytes per read
    pub fn with_read_chunk(mut self, n: usize) -> Self {
        self.read_chunk = Some(n.max(1));
        self
    }

    /// Drop the channel once `trigger` has been written
    pub fn close_when(mut self, trigger: impl AsRef<[u8]>) -> Self {
        self.close_on = Some(trigger.as_ref().to_vec());
        self
    }

    /// Fail the next `n` writes without closing the channel
    pub fn fail_writes(mut self, n: usize) -> Self {
        self.failed_writes = n;
        self
    }

    pub fn with_mode(mut self, mode: ChannelMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn written_str(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    /// Rules that never fired
    pub fn pending_rules(&self) -> usize {
        self.rules.len()
    }

    fn fire_rules(&mut self) {
        while let Some(rule) = self.rules.front() {
            let window = &self.written[self.watch_from..];
            match find(window, &rule.trigger) {
                Some(pos) => {
                    self.watch_from += pos + rule.trigger.len();
                    self.inbox.extend_from_slice(&rule.response);
                    self.rules.pop_front();
                }
                None => break,
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(XferError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted channel closed",
            )));
        }
        if self.failed_writes > 0 {
            self.failed_writes -= 1;
            return Err(XferError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "scripted write failure",
            )));
        }
        self.written.extend_from_slice(bytes);
        if let Some(trigger) = &self.close_on {
            if find(&self.written, trigger).is_some() {
                self.closed = true;
                return Ok(());
            }
        }
        self.fire_rules();
        Ok(())
    }

    fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        if self.inbox.is_empty() {
            if self.closed {
                return Err(XferError::TransportUnusable(
                    "scripted channel closed".to_string(),
                ));
            }
            thread::sleep(timeout.min(Duration::from_millis(1)));
            return Ok(Vec::new());
        }
        let n = self.read_chunk.unwrap_or(self.inbox.len()).min(self.inbox.len());
        Ok(self.inbox.drain(..n).collect())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn mode(&self) -> ChannelMode {
        self.mode
    }

    fn release(&mut self) -> Result<()> {
        self.releases += 1;
        Ok(())
    }

    fn is_usable(&self) -> bool {
        !self.closed
    }
}
