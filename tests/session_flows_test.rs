use rcxfer::core::package::{strip_padding, ChecksumKind, PackageFrame};
use rcxfer::core::pacing::CharPacer;
use rcxfer::core::session::{
    clean_basic_capture, clean_cpm_capture, Flow, FlowOutput, Session, SessionState,
    SessionTiming,
};
use rcxfer::transport::{ScriptedTransport, SimulatedTransport};
use rcxfer::XferError;
use std::time::Duration;

fn timing() -> SessionTiming {
    SessionTiming {
        prompt: Duration::from_millis(200),
        ack: Duration::from_millis(200),
        capture: Duration::from_millis(300),
        settle: Duration::from_millis(5),
        poll: Duration::from_millis(2),
    }
}

#[test]
fn test_cpm_send_drives_ed() {
    let mut t = ScriptedTransport::new()
        .on("USER 0\r\n", "USER 0\r\nA>")
        .on("ERA NOTES.BAK\r\n", "ERA NOTES.BAK\r\nNo File\r\nA>")
        .on("ERA NOTES.TXT\r\n", "ERA NOTES.TXT\r\nA>")
        .on("C:ED NOTES.TXT\r\n", "C:ED NOTES.TXT\r\n\r\nNEW FILE\r\n     : *")
        .on("\x1AE\r", "\r\nA>")
        .on("ERA NOTES.BAK\r\n", "ERA NOTES.BAK\r\nA>");
    let pacer = CharPacer::unpaced();
    let mut session = Session::new(&mut t, &pacer, timing());
    let out = session
        .run(&Flow::CpmSend {
            remote_name: "NOTES.TXT".into(),
            user: 0,
            content: b"first\rsecond\r".to_vec(),
        })
        .unwrap();
    assert_eq!(out, FlowOutput::Sent);
    assert_eq!(session.state(), &SessionState::Complete);
    let transmitted = session.transmitted();

    assert_eq!(t.pending_rules(), 0);
    assert_eq!(transmitted, t.written().len());
    assert!(t
        .written_str()
        .contains("ERA NOTES.TXT\r\nC:ED NOTES.TXT\r\ni\rfirst\rsecond\r\x1AE\r"));
}

#[test]
fn test_cpm_send_times_out_without_ed() {
    let mut t = ScriptedTransport::new()
        .on("USER 2\r\n", "A>")
        .on("ERA NOTES.BAK\r\n", "A>")
        .on("ERA NOTES.TXT\r\n", "No File\r\nA>");
    let pacer = CharPacer::unpaced();
    let mut session = Session::new(&mut t, &pacer, timing());
    let err = session
        .run(&Flow::CpmSend {
            remote_name: "NOTES.TXT".into(),
            user: 2,
            content: b"x\r".to_vec(),
        })
        .unwrap_err();
    match err {
        XferError::SessionTimeout { step, .. } => assert_eq!(step, "ED prompt"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(!t.written_str().contains("x\r"));
}

#[test]
fn test_cpm_receive_captures_type_output() {
    let mut t = ScriptedTransport::new()
        .on("USER 0\r\n", "USER 0\r\nA>")
        .on("DIR NOTES.TXT\r\n", "DIR NOTES.TXT\r\nA: NOTES    TXT\r\nA>")
        .on("TYPE NOTES.TXT\r\n", "TYPE NOTES.TXT\r\nline one\r\nline two\r\n\r\nA>");
    let pacer = CharPacer::unpaced();
    let mut session = Session::new(&mut t, &pacer, timing());
    let out = session
        .run(&Flow::CpmReceive {
            remote_name: "NOTES.TXT".into(),
            user: 0,
        })
        .unwrap();
    let FlowOutput::Received(raw) = out else {
        panic!("expected a capture");
    };
    assert_eq!(
        clean_cpm_capture(&raw, "TYPE NOTES.TXT"),
        b"line one\r\nline two\r\n"
    );
}

#[test]
fn test_cpm_receive_missing_remote() {
    let mut t = ScriptedTransport::new()
        .on("USER 0\r\n", "A>")
        .on("DIR GONE.TXT\r\n", "DIR GONE.TXT\r\nNo File\r\nA>");
    let pacer = CharPacer::unpaced();
    let mut session = Session::new(&mut t, &pacer, timing());
    let err = session
        .run(&Flow::CpmReceive {
            remote_name: "GONE.TXT".into(),
            user: 0,
        })
        .unwrap_err();
    assert!(matches!(err, XferError::RemoteNotFound(ref name) if name == "GONE.TXT"));
    assert!(!t.written_str().contains("TYPE"));
}

#[test]
fn test_package_receive_decodes_upload() {
    let frame = PackageFrame::encode(&[0xC3, 0x00, 0x01]);
    let reply = format!(
        "A:UPLOAD RUN.COM\r\n{}\r\nA>",
        String::from_utf8(frame.wire_payload()).unwrap()
    );
    let mut t = ScriptedTransport::new()
        .on("USER 0\r\n", "A>")
        .on("DIR RUN.COM\r\n", "A: RUN      COM\r\nA>")
        .on("A:UPLOAD RUN.COM\r\n", reply);
    let pacer = CharPacer::unpaced();
    let mut session = Session::new(&mut t, &pacer, timing());
    let out = session
        .run(&Flow::PackageReceive {
            remote_name: "RUN.COM".into(),
            user: 0,
            checksum: ChecksumKind::Additive16,
        })
        .unwrap();
    let FlowOutput::Received(payload) = out else {
        panic!("expected a payload");
    };
    assert_eq!(payload.len(), 128);
    assert_eq!(strip_padding(&payload), &[0xC3, 0x00, 0x01]);
}

#[test]
fn test_basic_receive_lists_program() {
    let mut t = ScriptedTransport::new().on("LIST\r\n", "LIST\r\n10 PRINT 1\r\n20 END\r\nOk\r\n");
    let pacer = CharPacer::unpaced();
    let mut session = Session::new(&mut t, &pacer, timing());
    let FlowOutput::Received(raw) = session.run(&Flow::BasicReceive).unwrap() else {
        panic!("expected a capture");
    };
    assert_eq!(clean_basic_capture(&raw, "LIST"), b"10 PRINT 1\r\n20 END\r\n");
}

#[test]
fn test_simulated_cpm_send_never_waits() {
    let mut t = SimulatedTransport::new();
    let pacer = CharPacer::unpaced();
    let mut session = Session::new(&mut t, &pacer, timing());
    let out = session
        .run(&Flow::CpmSend {
            remote_name: "A.TXT".into(),
            user: 1,
            content: b"a\r".to_vec(),
        })
        .unwrap();
    assert_eq!(out, FlowOutput::Sent);
    assert_eq!(
        t.written(),
        b"USER 1\r\nERA A.BAK\r\nERA A.TXT\r\nC:ED A.TXT\r\ni\ra\r\x1AE\rERA A.BAK\r\n"
    );
}

#[test]
fn test_paced_send_takes_at_least_the_delay() {
    let mut t = SimulatedTransport::new();
    let pacer = CharPacer::new(Duration::from_millis(2));
    let mut session = Session::new(&mut t, &pacer, timing());
    let started = std::time::Instant::now();
    session
        .run(&Flow::BasicSend {
            content: b"10 END\r\n".to_vec(),
        })
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(10));
    assert_eq!(t.written(), b"10 END\r\n");
}
