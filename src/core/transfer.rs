/*!
 * Single-job transfer: prepare the payload, run the session, write the result
 */

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::{Direction, TransmissionFormat};
use crate::core::job::{JobOutcome, TransferJob};
use crate::core::newline;
use crate::core::package::{self, ChecksumKind, PackageFrame};
use crate::core::pacing::CharPacer;
use crate::core::session::{self, Flow, FlowOutput, Session, SessionTiming};
use crate::error::{Result, XferError};
use crate::stats::TransferStats;
use crate::transport::{ChannelMode, Transport};

/// Settings shared by every job in a batch
pub struct TransferContext<'a> {
    pub pacer: &'a CharPacer,
    pub timing: SessionTiming,
    pub checksum: ChecksumKind,
}

/// Run one job to completion.
///
/// `stats` is filled in as the job progresses, so byte counts are available
/// even when the job fails.
pub fn perform_transfer<T: Transport + ?Sized>(
    job: &TransferJob,
    ctx: &TransferContext<'_>,
    transport: &mut T,
    stats: &mut TransferStats,
) -> Result<JobOutcome> {
    match job.direction {
        Direction::Send => send_file(job, ctx, transport, stats),
        Direction::Receive => receive_file(job, ctx, transport, stats),
    }
}

fn read_local(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => XferError::FileNotFound(path.to_path_buf()),
        _ => XferError::Io(e),
    })
}

fn run_flow<T: Transport + ?Sized>(
    flow: &Flow,
    ctx: &TransferContext<'_>,
    transport: &mut T,
    stats: &mut TransferStats,
) -> Result<FlowOutput> {
    let mut session = Session::new(transport, ctx.pacer, ctx.timing);
    let result = session.run(flow);
    stats.transmitted_bytes = session.transmitted();
    stats.received_bytes = session.received();
    result
}

fn send_file<T: Transport + ?Sized>(
    job: &TransferJob,
    ctx: &TransferContext<'_>,
    transport: &mut T,
    stats: &mut TransferStats,
) -> Result<JobOutcome> {
    let data = read_local(&job.local_path)?;
    stats.file_bytes = data.len();

    let payload = if job.is_text() {
        let (converted, nl) = newline::normalize(&data, &job.sources, job.effective_target());
        stats.newlines = Some(nl);
        converted
    } else {
        data
    };

    let flow = match job.transmission {
        TransmissionFormat::Package => {
            let frame = PackageFrame::encode_with(&payload, ctx.checksum.strategy());
            stats.padding_bytes = frame.padding();
            stats.package_bytes = Some(frame.wire_len());
            debug!(
                "{}: {} payload bytes, {} padding, checksum {:04X}",
                job.remote_name,
                frame.original_len(),
                frame.padding(),
                frame.checksum()
            );
            Flow::PackageSend {
                remote_name: job.remote_name.clone(),
                user: job.user,
                frame,
            }
        }
        TransmissionFormat::CpmPlaintext => Flow::CpmSend {
            remote_name: job.remote_name.clone(),
            user: job.user,
            content: payload,
        },
        TransmissionFormat::BasicPlaintext => Flow::BasicSend { content: payload },
    };

    let mode = transport.mode();
    run_flow(&flow, ctx, transport, stats)?;
    Ok(match mode {
        ChannelMode::Simulated => JobOutcome::Simulated,
        _ => JobOutcome::Completed,
    })
}

fn receive_file<T: Transport + ?Sized>(
    job: &TransferJob,
    ctx: &TransferContext<'_>,
    transport: &mut T,
    stats: &mut TransferStats,
) -> Result<JobOutcome> {
    let flow = match job.transmission {
        TransmissionFormat::Package => Flow::PackageReceive {
            remote_name: job.remote_name.clone(),
            user: job.user,
            checksum: ctx.checksum,
        },
        TransmissionFormat::CpmPlaintext => Flow::CpmReceive {
            remote_name: job.remote_name.clone(),
            user: job.user,
        },
        TransmissionFormat::BasicPlaintext => Flow::BasicReceive,
    };

    let raw = match run_flow(&flow, ctx, transport, stats)? {
        FlowOutput::Received(bytes) => bytes,
        FlowOutput::Simulated | FlowOutput::Sent => return Ok(JobOutcome::Simulated),
    };

    let content = match job.transmission {
        TransmissionFormat::Package if !job.is_text() => raw,
        TransmissionFormat::Package => package::strip_padding(&raw).to_vec(),
        TransmissionFormat::CpmPlaintext => {
            session::clean_cpm_capture(&raw, &format!("TYPE {}", job.remote_name))
        }
        TransmissionFormat::BasicPlaintext => session::clean_basic_capture(&raw, "LIST"),
    };

    let content = if job.is_text() {
        let (converted, nl) = newline::normalize(&content, &job.sources, job.effective_target());
        stats.newlines = Some(nl);
        converted
    } else {
        content
    };

    write_atomic(&job.local_path, &content)?;
    stats.file_bytes = content.len();
    debug!("Wrote {} bytes to {}", content.len(), job.local_path.display());
    Ok(JobOutcome::Completed)
}

/// Write through a temporary file in the destination directory
pub fn write_atomic(dest: &Path, content: &[u8]) -> Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| XferError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileFormat;
    use crate::core::classify::FormatOrigin;
    use crate::core::newline::{NewlineConvention, NewlineSet};
    use crate::transport::{ClipboardTransport, MemoryClipboard, ScriptedTransport, SimulatedTransport};
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;

    fn timing() -> SessionTiming {
        SessionTiming {
            prompt: Duration::from_millis(200),
            ack: Duration::from_millis(200),
            capture: Duration::from_millis(300),
            settle: Duration::from_millis(5),
            poll: Duration::from_millis(2),
        }
    }

    fn job(
        local_path: PathBuf,
        remote: &str,
        direction: Direction,
        transmission: TransmissionFormat,
        file_format: FileFormat,
    ) -> TransferJob {
        let (sources, target) = match direction {
            Direction::Send => (NewlineSet::new([NewlineConvention::Lf]), NewlineConvention::Crlf),
            Direction::Receive => (NewlineSet::new([NewlineConvention::Crlf]), NewlineConvention::Lf),
        };
        TransferJob {
            index: 1,
            local_path,
            remote_name: remote.to_string(),
            direction,
            transmission,
            file_format,
            format_origin: FormatOrigin::Specified,
            user: 0,
            sources,
            target,
        }
    }

    #[test]
    fn test_send_package_stats() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello.bas");
        fs::write(&path, b"10 print \"hello\";\n20 print \" world\"\n\n").unwrap();

        let pacer = CharPacer::unpaced();
        let ctx = TransferContext {
            pacer: &pacer,
            timing: timing(),
            checksum: ChecksumKind::Additive16,
        };
        let mut t = SimulatedTransport::new();
        let mut stats = TransferStats::default();
        let j = job(path, "HELLO.BAS", Direction::Send, TransmissionFormat::Package, FileFormat::Text);
        let outcome = perform_transfer(&j, &ctx, &mut t, &mut stats).unwrap();

        assert!(matches!(outcome, JobOutcome::Simulated));
        assert_eq!(stats.file_bytes, 37);
        assert_eq!(stats.padding_bytes, 128 - 40);
        assert_eq!(stats.package_bytes, Some(1 + 256 + 5));
        assert_eq!(stats.newlines.as_ref().map(|n| n.final_count), Some(3));
        assert_eq!(stats.transmitted_bytes, t.written().len());
    }

    #[test]
    fn test_send_missing_file() {
        let dir = tempdir().unwrap();
        let pacer = CharPacer::unpaced();
        let ctx = TransferContext {
            pacer: &pacer,
            timing: timing(),
            checksum: ChecksumKind::Additive16,
        };
        let mut t = SimulatedTransport::new();
        let mut stats = TransferStats::default();
        let j = job(
            dir.path().join("absent.txt"),
            "ABSENT.TXT",
            Direction::Send,
            TransmissionFormat::Package,
            FileFormat::Text,
        );
        let err = perform_transfer(&j, &ctx, &mut t, &mut stats).unwrap_err();
        assert!(matches!(err, XferError::FileNotFound(_)));
        assert!(t.written().is_empty());
    }

    #[test]
    fn test_cpm_send_uses_cr_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"one\ntwo\n").unwrap();

        let pacer = CharPacer::unpaced();
        let ctx = TransferContext {
            pacer: &pacer,
            timing: timing(),
            checksum: ChecksumKind::Additive16,
        };
        let mut t = SimulatedTransport::new();
        let mut stats = TransferStats::default();
        let j = job(path, "NOTES.TXT", Direction::Send, TransmissionFormat::CpmPlaintext, FileFormat::Text);
        perform_transfer(&j, &ctx, &mut t, &mut stats).unwrap();

        let written = String::from_utf8_lossy(t.written()).into_owned();
        assert!(written.contains("C:ED NOTES.TXT\r\ni\rone\rtwo\r\x1AE\r"));
    }

    #[test]
    fn test_receive_package_from_clipboard() {
        let dir = tempdir().unwrap();
        let frame = PackageFrame::encode(b"line\r\n");
        let pasted = format!("A:UPLOAD X.TXT\r\n:{}>{:04X}\r\nA>", frame.hex(), frame.checksum());

        let pacer = CharPacer::unpaced();
        let ctx = TransferContext {
            pacer: &pacer,
            timing: timing(),
            checksum: ChecksumKind::Additive16,
        };
        let mut t = ClipboardTransport::new(MemoryClipboard::with_content(pasted));
        let mut stats = TransferStats::default();
        let dest = dir.path().join("X.TXT");
        let j = job(dest.clone(), "X.TXT", Direction::Receive, TransmissionFormat::Package, FileFormat::Text);
        let outcome = perform_transfer(&j, &ctx, &mut t, &mut stats).unwrap();

        assert!(matches!(outcome, JobOutcome::Completed));
        assert_eq!(fs::read(&dest).unwrap(), b"line\n");
        assert_eq!(stats.file_bytes, 5);
    }

    #[test]
    fn test_basic_receive_keeps_pasted_first_line() {
        let dir = tempdir().unwrap();
        let pacer = CharPacer::unpaced();
        let ctx = TransferContext {
            pacer: &pacer,
            timing: timing(),
            checksum: ChecksumKind::Additive16,
        };
        let pasted = "10 REM LIST OF NAMES\r\n20 PRINT 1\r\nOk\r\n";
        let mut t = ClipboardTransport::new(MemoryClipboard::with_content(pasted));
        let mut stats = TransferStats::default();
        let dest = dir.path().join("NAMES.BAS");
        let j = job(
            dest.clone(),
            "NAMES.BAS",
            Direction::Receive,
            TransmissionFormat::BasicPlaintext,
            FileFormat::Text,
        );
        let outcome = perform_transfer(&j, &ctx, &mut t, &mut stats).unwrap();

        assert!(matches!(outcome, JobOutcome::Completed));
        assert_eq!(fs::read(&dest).unwrap(), b"10 REM LIST OF NAMES\n20 PRINT 1\n");
    }

    #[test]
    fn test_receive_checksum_mismatch_writes_nothing() {
        let dir = tempdir().unwrap();
        let frame = PackageFrame::encode(b"data");
        let reply = format!(":{}>{:04X}\r\nA>", frame.hex(), frame.checksum().wrapping_add(1));

        let pacer = CharPacer::unpaced();
        let ctx = TransferContext {
            pacer: &pacer,
            timing: timing(),
            checksum: ChecksumKind::Additive16,
        };
        let mut t = ScriptedTransport::new()
            .on("USER 0\r\n", "USER 0\r\nA>")
            .on("DIR X.BIN\r\n", "A: X        BIN\r\nA>")
            .on("UPLOAD X.BIN\r\n", reply);
        let mut stats = TransferStats::default();
        let dest = dir.path().join("X.BIN");
        let j = job(dest.clone(), "X.BIN", Direction::Receive, TransmissionFormat::Package, FileFormat::Binary);
        let err = perform_transfer(&j, &ctx, &mut t, &mut stats).unwrap_err();

        assert!(matches!(err, XferError::ChecksumMismatch { .. }));
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(stats.received_bytes > 0);
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        fs::write(&dest, b"old").unwrap();
        write_atomic(&dest, b"new").unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }
}
