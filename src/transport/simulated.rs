use std::time::Duration;

use super::{ChannelMode, Transport};
use crate::error::Result;

/// A channel with nothing on the other end; keeps what was written
#[derive(Debug, Default)]
pub struct SimulatedTransport {
    written: Vec<u8>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }
}

impl Transport for SimulatedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }

    fn read_available(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn mode(&self) -> ChannelMode {
        ChannelMode::Simulated
    }
}
