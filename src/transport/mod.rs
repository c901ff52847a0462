/*!
 * Byte transports the session automaton drives
 *
 * A transport is a duplex byte channel. Reads never block longer than the
 * timeout they are given and an empty result means nothing arrived.
 */

use std::time::Duration;

use crate::error::Result;

pub mod clipboard;
pub mod echo;
pub mod mock;
pub mod simulated;
pub mod stream;

pub use clipboard::{Clipboard, ClipboardTransport, FileClipboard, MemoryClipboard};
pub use echo::{EchoRenderer, EchoTransport};
pub use mock::ScriptedTransport;
pub use simulated::SimulatedTransport;
pub use stream::StreamTransport;

/// How much of a conversation the channel supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// A live remote answers every command
    Interactive,
    /// Output is captured for pasting; input is whatever was pasted
    Clipboard,
    /// Nothing is connected
    Simulated,
}

impl ChannelMode {
    /// Whether awaiting a remote response makes sense
    pub fn expects_responses(&self) -> bool {
        matches!(self, ChannelMode::Interactive)
    }
}

pub trait Transport: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Bytes received within `timeout`; empty on timeout
    fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    fn close(&mut self) -> Result<()>;

    fn mode(&self) -> ChannelMode {
        ChannelMode::Interactive
    }

    /// Hand the channel back between jobs without closing it
    fn release(&mut self) -> Result<()> {
        Ok(())
    }

    /// False once the channel has failed for good
    fn is_usable(&self) -> bool {
        true
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_available(timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn mode(&self) -> ChannelMode {
        (**self).mode()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }

    fn is_usable(&self) -> bool {
        (**self).is_usable()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_available(timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn mode(&self) -> ChannelMode {
        (**self).mode()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }

    fn is_usable(&self) -> bool {
        (**self).is_usable()
    }
}
