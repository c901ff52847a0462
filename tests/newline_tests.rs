use rcxfer::config::Direction;
use rcxfer::core::newline::{census, normalize, NewlineConvention, NewlineSet, NewlineSpec};

const HELLO: &[u8] = b"10 print \"hello\";\n20 print \" world\"\n\n";

fn only(convention: NewlineConvention) -> NewlineSet {
    NewlineSet::new([convention])
}

#[test]
fn test_lf_program_to_crlf() {
    assert_eq!(HELLO.len(), 37);
    let (out, stats) = normalize(HELLO, &only(NewlineConvention::Lf), NewlineConvention::Crlf);

    assert_eq!(out.len(), 40);
    assert_eq!(stats.lf, 3);
    assert_eq!(stats.final_count, 3);

    let after = census(&out);
    assert_eq!(after.crlf, 3);
    assert_eq!(after.lf, 0);
    assert_eq!(after.cr, 0);
    assert_eq!(after.lfcr, 0);
}

#[test]
fn test_system_specs_resolve_per_direction() {
    let sending = NewlineSet::resolve(&[NewlineSpec::System], Direction::Send);
    assert!(sending.contains(NewlineConvention::host()));
    assert_eq!(
        NewlineSpec::System.resolve_target(Direction::Send),
        NewlineConvention::Crlf
    );
    assert_eq!(
        NewlineSpec::System.resolve_source(Direction::Receive),
        NewlineConvention::Crlf
    );
}

#[test]
fn test_converged_payload_is_stable() {
    let mixed: &[u8] = b"one\r\ntwo\nthree\rfour\n\rfive";
    for target in NewlineConvention::LONGEST_FIRST {
        let sources = NewlineSet::new(NewlineConvention::LONGEST_FIRST);
        let (first, _) = normalize(mixed, &sources, target);
        let (again, _) = normalize(&first, &only(target), target);
        let (third, _) = normalize(&again, &only(target), target);
        assert_eq!(again, first, "target {}", target);
        assert_eq!(third, again, "target {}", target);
    }
}

#[test]
fn test_mismatched_round_trip_is_not_identity() {
    // LF -> CRLF, then CR -> LF leaves the LFs from the first pass behind
    let (crlf, _) = normalize(b"a\nb\n", &only(NewlineConvention::Lf), NewlineConvention::Crlf);
    assert_eq!(crlf, b"a\r\nb\r\n");

    let (partial, _) = normalize(&crlf, &only(NewlineConvention::Cr), NewlineConvention::Lf);
    assert_eq!(partial, b"a\n\nb\n\n");

    let (back, _) = normalize(&partial, &only(NewlineConvention::Lf), NewlineConvention::Crlf);
    assert_ne!(back, crlf);
    assert_eq!(back, b"a\r\n\r\nb\r\n\r\n");
}

#[test]
fn test_empty_sources_disable_conversion() {
    let (out, stats) = normalize(HELLO, &NewlineSet::empty(), NewlineConvention::Cr);
    assert_eq!(out, HELLO);
    assert_eq!(stats.target, None);
    assert_eq!(stats.final_count, 0);
    assert_eq!(stats.lf, 3);
}

#[test]
fn test_census_ignores_source_set() {
    let (_, stats) = normalize(
        b"a\r\nb\rc\n\rd",
        &only(NewlineConvention::Lf),
        NewlineConvention::Lf,
    );
    assert_eq!(stats.crlf, 1);
    assert_eq!(stats.cr, 1);
    assert_eq!(stats.lfcr, 1);
    assert_eq!(stats.lf, 0);
}
