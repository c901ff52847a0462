/*!
 * Remote name resolution: 8.3 conformance, renaming and wildcard expansion
 */

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{Result, XferError};

pub const MAX_STEM: usize = 8;
pub const MAX_EXT: usize = 3;

static LISTING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Pa-p])\s*:(.*)$").unwrap());

static MISSING_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)no file|can't find").unwrap());

/// Outcome of checking a candidate remote name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameCheck {
    /// Conforming; uppercased form
    Valid(String),
    /// Needs confirmation of `suggested`
    NeedsRename { original: String, suggested: String },
}

/// Asks the user to confirm or override a suggested name
pub trait RenamePrompt {
    /// Return the chosen name; an empty answer accepts `suggested`
    fn ask(&mut self, original: &str, suggested: &str) -> Result<String>;
}

/// Non-interactive prompt that always takes the suggestion
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptSuggestion;

impl RenamePrompt for AcceptSuggestion {
    fn ask(&mut self, _original: &str, _suggested: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// A resolved remote name and whether it differs from the local one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub renamed: bool,
}

fn is_cpm_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'()-@^_`{}~".contains(c)
}

/// Split at the last dot; a leading dot does not start an extension
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

pub fn check_name(base: &str) -> NameCheck {
    let (stem, ext) = split_name(base);
    let ext_ok = ext.map_or(true, |e| e.len() <= MAX_EXT && e.chars().all(is_cpm_char));
    if !stem.is_empty()
        && stem.len() <= MAX_STEM
        && stem.chars().all(is_cpm_char)
        && ext_ok
        && ext != Some("")
    {
        NameCheck::Valid(base.to_ascii_uppercase())
    } else {
        NameCheck::NeedsRename {
            original: base.to_string(),
            suggested: suggest_name(base),
        }
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if is_cpm_char(c) { c } else { '-' })
        .collect()
}

/// Truncated, uppercased 8.3 candidate for `base`
pub fn suggest_name(base: &str) -> String {
    let (stem, ext) = split_name(base);
    let stem = sanitize(stem);
    let mut stem: String = stem.chars().take(MAX_STEM).collect();
    while stem.ends_with('-') {
        stem.pop();
    }
    if stem.is_empty() {
        stem = "FILE".to_string();
    }
    let ext: String = ext
        .map(|e| sanitize(e).chars().take(MAX_EXT).collect())
        .unwrap_or_default();
    let candidate = if ext.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, ext)
    };
    candidate.to_ascii_uppercase()
}

/// Length check on a name the user typed
pub fn validate_override(answer: &str) -> Result<String> {
    let invalid = |reason: &str| XferError::InvalidName {
        name: answer.to_string(),
        reason: reason.to_string(),
    };
    let parts: Vec<&str> = answer.split('.').collect();
    match parts.as_slice() {
        [stem] if !stem.is_empty() && stem.len() <= MAX_STEM => Ok(answer.to_ascii_uppercase()),
        [stem, ext] if !stem.is_empty() && stem.len() <= MAX_STEM && ext.len() <= MAX_EXT => {
            Ok(answer.to_ascii_uppercase())
        }
        [stem, ..] if stem.is_empty() => Err(invalid("empty name")),
        [_, _] => Err(invalid("name longer than 8 or extension longer than 3 characters")),
        [_] => Err(invalid("name longer than 8 characters")),
        _ => Err(invalid("more than one '.'")),
    }
}

/// Resolve the remote name for a local file being sent
pub fn resolve_remote_name(local: &Path, prompt: &mut dyn RenamePrompt) -> Result<ResolvedName> {
    let base = local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| XferError::InvalidName {
            name: local.display().to_string(),
            reason: "path has no file name".to_string(),
        })?;

    match check_name(&base) {
        NameCheck::Valid(name) => Ok(ResolvedName {
            name,
            renamed: false,
        }),
        NameCheck::NeedsRename {
            original,
            suggested,
        } => {
            let answer = prompt.ask(&original, &suggested)?;
            let answer = answer.trim();
            let name = if answer.is_empty() {
                suggested
            } else {
                validate_override(answer)?
            };
            Ok(ResolvedName { name, renamed: true })
        }
    }
}

/// Local file name for a remote name: any `X:` drive prefix is dropped
pub fn local_name_for_remote(remote: &str) -> String {
    let bytes = remote.as_bytes();
    if bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        remote[2..].to_string()
    } else {
        remote.to_string()
    }
}

pub fn has_wildcards(name: &str) -> bool {
    name.contains(['?', '*', '['])
}

/// One file in a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// None for names that were made up rather than listed
    pub drive: Option<char>,
    pub name: String,
}

impl RemoteEntry {
    /// `A:NAME.EXT`, or the bare name without a drive
    pub fn qualified(&self) -> String {
        match self.drive {
            Some(drive) => format!("{}:{}", drive, self.name),
            None => self.name.clone(),
        }
    }
}

/// Parsed `DIR` response, in listing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    entries: Vec<RemoteEntry>,
}

impl RemoteListing {
    pub fn from_entries(entries: Vec<RemoteEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RemoteEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn qualified_names(&self) -> Vec<String> {
        self.entries.iter().map(RemoteEntry::qualified).collect()
    }
}

/// True when the remote reported that nothing matched
pub fn reports_missing(response: &[u8]) -> bool {
    MISSING_FILE.is_match(&String::from_utf8_lossy(response))
}

/// Parse CP/M `DIR` output such as `A: FOO      TXT : BAR      COM`.
///
/// Echo and prompt lines do not start with `X:` and are skipped.
pub fn parse_listing(response: &[u8]) -> RemoteListing {
    let text = String::from_utf8_lossy(response);
    let mut entries: Vec<RemoteEntry> = Vec::new();

    for line in text.lines() {
        let Some(caps) = LISTING_LINE.captures(line) else {
            continue;
        };
        let drive = caps[1].chars().next().map(|c| c.to_ascii_uppercase());
        for segment in caps[2].split(':') {
            let name = segment.split_whitespace().collect::<Vec<_>>().join(".");
            if name.is_empty() {
                continue;
            }
            let entry = RemoteEntry {
                drive,
                name: name.to_ascii_uppercase(),
            };
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
    }

    RemoteListing { entries }
}

/// Stand-in for a wildcard that cannot be listed: `?` becomes `A`, `*` vanishes,
/// and a `[...]` class contributes its first character
pub fn placeholder_expansion(pattern: &str) -> String {
    let mut out = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '?' => out.push('A'),
            '*' => {}
            '[' => {
                let class: String = chars.by_ref().take_while(|&c| c != ']').collect();
                if let Some(first) = class.chars().next() {
                    out.push(first);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Answer(&'static str);

    impl RenamePrompt for Answer {
        fn ask(&mut self, _original: &str, _suggested: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_conforming_names_uppercased() {
        assert_eq!(check_name("hello.bas"), NameCheck::Valid("HELLO.BAS".into()));
        assert_eq!(check_name("README"), NameCheck::Valid("README".into()));
    }

    #[test]
    fn test_long_names_need_rename() {
        match check_name("hello-world.program.bas") {
            NameCheck::NeedsRename { suggested, .. } => assert_eq!(suggested, "HELLO-WO.BAS"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(check_name("a.text"), NameCheck::NeedsRename { .. }));
        assert!(matches!(check_name("my file.c"), NameCheck::NeedsRename { .. }));
    }

    #[test]
    fn test_suggestions() {
        assert_eq!(suggest_name("averyverylongname.txt"), "AVERYVER.TXT");
        assert_eq!(suggest_name("abcdefg.h.c"), "ABCDEFG.C");
        assert_eq!(suggest_name("space name.markdown"), "SPACE-NA.MAR");
        assert_eq!(suggest_name("........x"), "FILE.X");
        assert_eq!(suggest_name(".profile"), "-PROFILE");
    }

    #[test]
    fn test_resolve_uses_suggestion_on_empty_answer() {
        let resolved =
            resolve_remote_name(Path::new("/tmp/longfilename.txt"), &mut AcceptSuggestion).unwrap();
        assert_eq!(resolved.name, "LONGFILE.TXT");
        assert!(resolved.renamed);
    }

    #[test]
    fn test_resolve_override() {
        let resolved =
            resolve_remote_name(Path::new("longfilename.txt"), &mut Answer("game.com")).unwrap();
        assert_eq!(resolved.name, "GAME.COM");
        let err =
            resolve_remote_name(Path::new("longfilename.txt"), &mut Answer("toolongname.x"))
                .unwrap_err();
        assert!(matches!(err, XferError::InvalidName { .. }));
    }

    #[test]
    fn test_override_validation() {
        assert!(validate_override("A.B.C").is_err());
        assert!(validate_override(".TXT").is_err());
        assert!(validate_override("NAME.LONG").is_err());
        assert_eq!(validate_override("ok").unwrap(), "OK");
    }

    #[test]
    fn test_local_name_strips_drive() {
        assert_eq!(local_name_for_remote("A:FOO.TXT"), "FOO.TXT");
        assert_eq!(local_name_for_remote("FOO.TXT"), "FOO.TXT");
        assert_eq!(local_name_for_remote("A:"), "A:");
    }

    #[test]
    fn test_parse_listing() {
        let response = b"DIR *.TXT\r\nA: FOO      TXT : BAR      TXT\r\nA: BAZ      TXT\r\nA>";
        let listing = parse_listing(response);
        assert_eq!(
            listing.qualified_names(),
            vec!["A:FOO.TXT", "A:BAR.TXT", "A:BAZ.TXT"]
        );
    }

    #[test]
    fn test_no_file_listing() {
        let response = b"DIR *.XYZ\r\nNo file\r\nA>";
        assert!(parse_listing(response).is_empty());
        assert!(reports_missing(response));
        assert!(reports_missing(b"NO FILE"));
        assert!(!reports_missing(b"A: FOO      TXT"));
    }

    #[test]
    fn test_placeholder_expansion() {
        assert_eq!(placeholder_expansion("FOO?.TXT"), "FOOA.TXT");
        assert_eq!(placeholder_expansion("*.BAS"), ".BAS");
        assert_eq!(placeholder_expansion("PROG[123].COM"), "PROG1.COM");
        assert!(has_wildcards("A*.C"));
        assert!(!has_wildcards("A.C"));
    }
}
