/*!
 * Console echo of outgoing traffic
 *
 * Display only: the wire sees exactly the bytes the session wrote.
 */

use std::io::{self, Write};
use std::time::Duration;

use super::{ChannelMode, Transport};
use crate::error::Result;

const PAIRS_PER_LINE: usize = 16;

/// Turns written bytes into readable console text
#[derive(Debug, Default)]
pub struct EchoRenderer {
    in_hex: bool,
    nibble: Option<u8>,
    pairs: usize,
    at_line_start: bool,
}

impl EchoRenderer {
    pub fn new() -> Self {
        Self {
            at_line_start: true,
            ..Default::default()
        }
    }

    pub fn render(&mut self, bytes: &[u8]) -> String {
        let mut out = String::new();
        for &b in bytes {
            self.render_byte(b, &mut out);
        }
        out
    }

    fn render_byte(&mut self, b: u8, out: &mut String) {
        if self.in_hex {
            if b.is_ascii_hexdigit() {
                match self.nibble.take() {
                    None => self.nibble = Some(b),
                    Some(first) => {
                        out.push(first as char);
                        out.push(b as char);
                        self.pairs += 1;
                        out.push(if self.pairs % PAIRS_PER_LINE == 0 { '\n' } else { ' ' });
                    }
                }
                return;
            }
            if let Some(first) = self.nibble.take() {
                out.push(first as char);
            }
            if self.pairs % PAIRS_PER_LINE != 0 {
                out.push('\n');
            }
            self.in_hex = false;
        }

        // A package payload starts with ':' at the beginning of a line
        if b == b':' && self.at_line_start {
            out.push(':');
            out.push('\n');
            self.in_hex = true;
            self.pairs = 0;
            self.at_line_start = false;
            return;
        }

        match b {
            b'\\' => out.push_str("\\\\"),
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n\n"),
            b'\t' => out.push_str("\\t\t"),
            0x00 => out.push_str("\\0"),
            0x1A => out.push_str("\\x1A"),
            0x20..=0x7E => out.push(b as char),
            other => out.push_str(&format!("\\x{:02X}", other)),
        }
        self.at_line_start = b == b'\n' || b == b'\r';
    }
}

/// Wraps a transport and mirrors every write to a console sink
pub struct EchoTransport<T: Transport> {
    inner: T,
    renderer: EchoRenderer,
    sink: Box<dyn Write + Send>,
}

impl<T: Transport> EchoTransport<T> {
    /// Echo to stderr
    pub fn new(inner: T) -> Self {
        Self::with_sink(inner, Box::new(io::stderr()))
    }

    pub fn with_sink(inner: T, sink: Box<dyn Write + Send>) -> Self {
        Self {
            inner,
            renderer: EchoRenderer::new(),
            sink,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for EchoTransport<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let text = self.renderer.render(bytes);
        // Echo failures never affect the transfer
        let _ = self.sink.write_all(text.as_bytes());
        let _ = self.sink.flush();
        self.inner.write(bytes)
    }

    fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.inner.read_available(timeout)
    }

    fn close(&mut self) -> Result<()> {
        let _ = self.sink.write_all(b"\n");
        self.inner.close()
    }

    fn mode(&self) -> ChannelMode {
        self.inner.mode()
    }

    fn release(&mut self) -> Result<()> {
        self.inner.release()
    }

    fn is_usable(&self) -> bool {
        self.inner.is_usable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimulatedTransport;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_control_characters_escaped() {
        let mut r = EchoRenderer::new();
        assert_eq!(r.render(b"i\r"), "i\\r");
        assert_eq!(r.render(b"\x1AE\r"), "\\x1AE\\r");
        assert_eq!(r.render(b"a\tb\0"), "a\\t\tb\\0");
    }

    #[test]
    fn test_hex_grouped_in_pairs() {
        let mut r = EchoRenderer::new();
        let text = r.render(b"U0\r\n:4142430A>00D0");
        assert_eq!(text, "U0\\r\\n\n:\n41 42 43 0A \n>00D0");
    }

    #[test]
    fn test_colon_mid_line_is_plain() {
        let mut r = EchoRenderer::new();
        let text = r.render(b"x A:DOWNLOAD");
        assert_eq!(text, "x A:DOWNLOAD");
    }

    #[test]
    fn test_wire_content_untouched() {
        let sink = SharedSink::default();
        let mut t = EchoTransport::with_sink(SimulatedTransport::new(), Box::new(sink.clone()));
        t.write(b"USER 0\r\n").unwrap();
        assert_eq!(t.inner().written(), b"USER 0\r\n");
        assert_eq!(&*sink.0.lock().unwrap(), b"USER 0\\r\\n\n");
    }
}
