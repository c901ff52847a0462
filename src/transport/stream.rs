/*!
 * Transport over any `Read` + `Write` pair, such as a tty opened as a file
 *
 * Line settings (baud, parity, flow control, raw mode) belong to the
 * operating system and are set with `stty` before the device is opened.
 */

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChannelMode, Transport};
use crate::error::{Result, XferError};

const READ_CHUNK: usize = 512;

enum Incoming {
    Data(Vec<u8>),
    Eof,
    Failed(io::Error),
}

pub struct StreamTransport<W: Write + Send> {
    writer: W,
    incoming: Receiver<Incoming>,
    dead: Option<String>,
}

impl StreamTransport<File> {
    /// Open a character device (or any file) for reading and writing
    pub fn open(path: &Path) -> Result<Self> {
        let device = OpenOptions::new().read(true).write(true).open(path)?;
        let reader = device.try_clone()?;
        debug!("Opened {} as stream transport", path.display());
        Ok(Self::new(reader, device))
    }
}

impl<W: Write + Send> StreamTransport<W> {
    /// Spawn a reader thread that forwards chunks from `reader`
    pub fn new<R: Read + Send + 'static>(mut reader: R, writer: W) -> Self {
        let (tx, rx) = unbounded();

        thread::Builder::new()
            .name("rcxfer-reader".to_string())
            .spawn(move || {
                let mut buf = [0u8; READ_CHUNK];
                loop {
                    let event = match reader.read(&mut buf) {
                        Ok(0) => Incoming::Eof,
                        Ok(n) => Incoming::Data(buf[..n].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => Incoming::Failed(e),
                    };
                    let last = !matches!(event, Incoming::Data(_));
                    if tx.send(event).is_err() || last {
                        break;
                    }
                }
            })
            .ok();

        Self {
            writer,
            incoming: rx,
            dead: None,
        }
    }

    fn mark_dead(&mut self, reason: String) {
        warn!("Stream transport unusable: {}", reason);
        self.dead = Some(reason);
    }

    fn check_alive(&self) -> Result<()> {
        match &self.dead {
            Some(reason) => Err(XferError::TransportUnusable(reason.clone())),
            None => Ok(()),
        }
    }

    /// Fold one event into `out`; false when the stream has ended
    fn absorb(&mut self, event: Incoming, out: &mut Vec<u8>) -> bool {
        match event {
            Incoming::Data(chunk) => {
                out.extend_from_slice(&chunk);
                true
            }
            Incoming::Eof => {
                self.mark_dead("remote closed the channel".to_string());
                false
            }
            Incoming::Failed(e) => {
                self.mark_dead(format!("read failed: {}", e));
                false
            }
        }
    }
}

impl<W: Write + Send> Transport for StreamTransport<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_alive()?;
        let result = self.writer.write_all(bytes).and_then(|_| self.writer.flush());
        if let Err(e) = result {
            self.mark_dead(format!("write failed: {}", e));
            return Err(XferError::Io(e));
        }
        Ok(())
    }

    fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.check_alive()?;
        let mut out = Vec::new();
        let first = match self.incoming.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => return Ok(out),
            Err(RecvTimeoutError::Disconnected) => {
                self.mark_dead("reader thread stopped".to_string());
                return Err(XferError::TransportUnusable(
                    "reader thread stopped".to_string(),
                ));
            }
        };
        if self.absorb(first, &mut out) {
            while let Ok(event) = self.incoming.try_recv() {
                if !self.absorb(event, &mut out) {
                    break;
                }
            }
        }
        // Hand back whatever arrived before the channel died
        if out.is_empty() {
            self.check_alive()?;
        }
        Ok(out)
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        if self.dead.is_none() {
            self.dead = Some("closed".to_string());
        }
        Ok(())
    }

    fn mode(&self) -> ChannelMode {
        ChannelMode::Interactive
    }

    fn is_usable(&self) -> bool {
        self.dead.is_none()
    }
}
