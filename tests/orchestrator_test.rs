use rcxfer::config::{Direction, FileFormat, TransferConfig, TransmissionFormat};
use rcxfer::core::package::PackageFrame;
use rcxfer::error::{EXIT_INTEGRITY, EXIT_PARTIAL, EXIT_SUCCESS};
use rcxfer::transport::{ClipboardTransport, FileClipboard, ScriptedTransport, SimulatedTransport};
use rcxfer::{JobOutcome, JobRequest, Orchestrator, Transport, XferError};
use std::fs;
use tempfile::TempDir;

fn fast_config(output: &TempDir) -> TransferConfig {
    TransferConfig {
        file_delay_ms: 0,
        prompt_timeout_ms: 200,
        ack_timeout_ms: 200,
        capture_timeout_ms: 300,
        settle_ms: 5,
        poll_ms: 2,
        echo: false,
        output_dir: Some(output.path().to_path_buf()),
        ..Default::default()
    }
}

#[test]
fn test_missing_file_is_reported_and_batch_continues() {
    let temp = TempDir::new().unwrap();
    let present = temp.path().join("present.bas");
    fs::write(&present, b"10 PRINT 1\n").unwrap();

    let config = fast_config(&temp);
    let mut transport = SimulatedTransport::new();
    let batch = Orchestrator::new(&config, &mut transport).run(
        Direction::Send,
        &[
            JobRequest::new(present.to_string_lossy()),
            JobRequest::new(temp.path().join("absent.bas").to_string_lossy()),
            JobRequest::new(present.to_string_lossy()),
        ],
    );

    assert_eq!(batch.jobs.len(), 3);
    assert_eq!(batch.succeeded(), 2);
    assert_eq!(batch.failed(), 1);
    assert!(matches!(
        batch.jobs[1].outcome,
        JobOutcome::Failed(XferError::FileNotFound(_))
    ));
    assert_eq!(batch.exit_code(), EXIT_PARTIAL);
    assert_eq!(batch.jobs[2].job.index, 3);
}

#[test]
fn test_checksum_mismatch_leaves_no_file() {
    let temp = TempDir::new().unwrap();
    let frame = PackageFrame::encode(b"payload");
    let reply = format!(
        "A:UPLOAD DATA.BIN\r\n:{}>{:04X}\r\nA>",
        frame.hex(),
        frame.checksum() ^ 0x0101
    );

    let config = fast_config(&temp);
    let mut transport = ScriptedTransport::new()
        .on("USER 0\r\n", "A>")
        .on("DIR DATA.BIN\r\n", "A: DATA     BIN\r\nA>")
        .on("A:UPLOAD DATA.BIN\r\n", reply);
    let batch = Orchestrator::new(&config, &mut transport)
        .run(Direction::Receive, &[JobRequest::new("data.bin")]);

    assert!(matches!(
        batch.jobs[0].outcome,
        JobOutcome::Failed(XferError::ChecksumMismatch { .. })
    ));
    assert_eq!(batch.exit_code(), EXIT_INTEGRITY);
    assert!(!temp.path().join("DATA.BIN").exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn test_cpm_receive_writes_host_text() {
    let temp = TempDir::new().unwrap();
    let config = TransferConfig {
        transmission_format: TransmissionFormat::CpmPlaintext,
        ..fast_config(&temp)
    };
    let mut transport = ScriptedTransport::new()
        .on("USER 0\r\n", "USER 0\r\nA>")
        .on("DIR NOTES.TXT\r\n", "DIR NOTES.TXT\r\nA: NOTES    TXT\r\nA>")
        .on("TYPE NOTES.TXT\r\n", "TYPE NOTES.TXT\r\nalpha\r\nbeta\r\n\r\nA>");
    let batch = Orchestrator::new(&config, &mut transport)
        .run(Direction::Receive, &[JobRequest::new("notes.txt")]);

    assert!(batch.is_success(), "{:?}", batch.errors().collect::<Vec<_>>());
    assert_eq!(batch.exit_code(), EXIT_SUCCESS);
    let report = &batch.jobs[0];
    assert_eq!(report.job.remote_name, "NOTES.TXT");
    assert_eq!(report.job.file_format, FileFormat::Text);

    let written = fs::read(temp.path().join("NOTES.TXT")).unwrap();
    let expected: &[u8] = if cfg!(windows) {
        b"alpha\r\nbeta\r\n"
    } else {
        b"alpha\nbeta\n"
    };
    assert_eq!(written, expected);
    assert_eq!(report.stats.file_bytes, expected.len());
}

#[test]
fn test_clipboard_send_accumulates_every_job() {
    let temp = TempDir::new().unwrap();
    let clip = temp.path().join("clipboard");
    let a = temp.path().join("a.txt");
    let b = temp.path().join("b.txt");
    fs::write(&a, b"first\n").unwrap();
    fs::write(&b, b"second\n").unwrap();

    let config = fast_config(&temp);
    let mut transport = ClipboardTransport::new(FileClipboard::new(&clip));
    let batch = Orchestrator::new(&config, &mut transport).run(
        Direction::Send,
        &[
            JobRequest::new(a.to_string_lossy()),
            JobRequest::new(b.to_string_lossy()),
        ],
    );
    transport.close().unwrap();

    assert!(batch.is_success());
    assert_eq!(batch.simulated(), 0);
    let pasted = String::from_utf8(fs::read(&clip).unwrap()).unwrap();
    let first = pasted.find("A:DOWNLOAD A.TXT\r\n").unwrap();
    let second = pasted.find("A:DOWNLOAD B.TXT\r\n").unwrap();
    assert!(first < second);
}

#[test]
fn test_basic_receive_without_remote_uses_placeholder() {
    let temp = TempDir::new().unwrap();
    let config = TransferConfig {
        transmission_format: TransmissionFormat::BasicPlaintext,
        ..fast_config(&temp)
    };
    let mut transport = SimulatedTransport::new();
    let batch = Orchestrator::new(&config, &mut transport)
        .run(Direction::Receive, &[JobRequest::remote_pattern("prog?.bas")]);

    assert_eq!(batch.jobs.len(), 1);
    assert!(matches!(batch.jobs[0].outcome, JobOutcome::Simulated));
    assert_eq!(transport.written(), b"LIST\r\n");
}
