/*!
 * Clipboard-backed transport
 *
 * Outgoing bytes accumulate and are published to the clipboard whenever the
 * channel is released, so the user can paste them into a terminal. Incoming
 * bytes are whatever the clipboard held, delivered once per job.
 */

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::{ChannelMode, Transport};
use crate::error::Result;

pub trait Clipboard: Send {
    /// Replace the clipboard content
    fn set(&mut self, bytes: &[u8]) -> Result<()>;

    /// Current clipboard content; repeated calls return the same bytes
    fn get(&mut self) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    content: Vec<u8>,
}

impl MemoryClipboard {
    pub fn with_content(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

impl Clipboard for MemoryClipboard {
    fn set(&mut self, bytes: &[u8]) -> Result<()> {
        self.content = bytes.to_vec();
        Ok(())
    }

    fn get(&mut self) -> Result<Vec<u8>> {
        Ok(self.content.clone())
    }
}

/// A file standing in for the system clipboard (pipe it through `xclip`, `pbcopy`, ...)
#[derive(Debug, Clone)]
pub struct FileClipboard {
    path: PathBuf,
}

impl FileClipboard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Clipboard for FileClipboard {
    fn set(&mut self, bytes: &[u8]) -> Result<()> {
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    fn get(&mut self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct ClipboardTransport<C: Clipboard> {
    clipboard: C,
    outgoing: Vec<u8>,
    delivered: bool,
}

impl<C: Clipboard> ClipboardTransport<C> {
    pub fn new(clipboard: C) -> Self {
        Self {
            clipboard,
            outgoing: Vec::new(),
            delivered: false,
        }
    }

    /// Everything written since the transport was created
    pub fn outgoing(&self) -> &[u8] {
        &self.outgoing
    }

    pub fn into_inner(self) -> C {
        self.clipboard
    }

    fn publish(&mut self) -> Result<()> {
        if !self.outgoing.is_empty() {
            debug!("Publishing {} bytes to clipboard", self.outgoing.len());
            self.clipboard.set(&self.outgoing)?;
        }
        Ok(())
    }
}

impl<C: Clipboard> Transport for ClipboardTransport<C> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.outgoing.extend_from_slice(bytes);
        Ok(())
    }

    fn read_available(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
        if self.delivered {
            return Ok(Vec::new());
        }
        self.delivered = true;
        self.clipboard.get()
    }

    fn close(&mut self) -> Result<()> {
        self.publish()
    }

    fn mode(&self) -> ChannelMode {
        ChannelMode::Clipboard
    }

    fn release(&mut self) -> Result<()> {
        self.delivered = false;
        self.publish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pasted_content_delivered_once_per_job() {
        let mut transport = ClipboardTransport::new(MemoryClipboard::with_content("10 PRINT\r\nOk\r\n"));
        let t = Duration::from_millis(1);
        assert_eq!(transport.read_available(t).unwrap(), b"10 PRINT\r\nOk\r\n");
        assert!(transport.read_available(t).unwrap().is_empty());
        transport.release().unwrap();
        assert_eq!(transport.read_available(t).unwrap(), b"10 PRINT\r\nOk\r\n");
    }

    #[test]
    fn test_writes_published_on_release() {
        let mut transport = ClipboardTransport::new(MemoryClipboard::default());
        transport.write(b"A:DOWNLOAD X.TXT\r\n").unwrap();
        assert!(transport.clipboard.content().is_empty());
        transport.release().unwrap();
        assert_eq!(transport.into_inner().content(), b"A:DOWNLOAD X.TXT\r\n");
    }

    #[test]
    fn test_file_clipboard() {
        let dir = tempfile::tempdir().unwrap();
        let mut clip = FileClipboard::new(dir.path().join("clip.txt"));
        assert!(clip.get().unwrap().is_empty());
        clip.set(b"hello").unwrap();
        assert_eq!(clip.get().unwrap(), b"hello");
        assert_eq!(clip.get().unwrap(), b"hello");
    }
}
