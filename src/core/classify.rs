/*!
 * Text/binary classification of transferred files
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{Direction, FileFormat, TransmissionFormat};

/// Bytes inspected by the content heuristic
pub const CONTENT_SNIFF_LEN: usize = 1024;

/// Which rule decided a file's format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatOrigin {
    /// Plaintext transmission formats always carry text
    Forced,
    /// Explicit override from the caller
    Specified,
    /// Extension table
    Extension,
    /// ASCII sniff of the leading bytes
    Content,
    /// Nothing matched
    Default,
}

impl fmt::Display for FormatOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatOrigin::Forced => "forced",
            FormatOrigin::Specified => "specified",
            FormatOrigin::Extension => "extension",
            FormatOrigin::Content => "content",
            FormatOrigin::Default => "default",
        };
        f.write_str(s)
    }
}

/// Extension lists consulted before the content heuristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionTable {
    #[serde(default)]
    pub text: Vec<String>,
    #[serde(default)]
    pub binary: Vec<String>,
}

const TEXT_EXTENSIONS: &[&str] = &[
    ".TXT", ".ME", ".BAK", ".ASM", ".Z80", ".HEX", ".IHX", ".LIS", ".LST", ".MAP", ".SYM",
    ".ADB", ".ADS", ".BAS", ".C", ".H", ".F", ".F77", ".FOR", ".FTH", ".FS", ".4TH", ".PAS",
    ".JSON", ".XML", ".MD", ".TEX", ".PKG",
];

const BINARY_EXTENSIONS: &[&str] = &[".BIN", ".COM", ".O"];

impl Default for ExtensionTable {
    fn default() -> Self {
        Self {
            text: TEXT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            binary: BINARY_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ExtensionTable {
    /// Look up by extension, case-insensitively; text entries take priority
    pub fn lookup(&self, name: &str) -> Option<FileFormat> {
        let ext = extension_of(name)?;
        let hit = |list: &[String]| {
            list.iter()
                .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
        };
        if hit(&self.text) {
            Some(FileFormat::Text)
        } else if hit(&self.binary) {
            Some(FileFormat::Binary)
        } else {
            None
        }
    }
}

fn extension_of(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < base.len() => Some(&base[idx + 1..]),
        _ => None,
    }
}

/// Inputs to classification that do not depend on the file itself
#[derive(Debug, Clone, Copy)]
pub struct ClassifyOptions<'a> {
    pub transmission: TransmissionFormat,
    pub override_format: Option<FileFormat>,
    pub direction: Direction,
    pub table: &'a ExtensionTable,
}

/// True when every inspected byte is 7-bit ASCII
pub fn looks_like_text(content: &[u8]) -> bool {
    let end = content.len().min(CONTENT_SNIFF_LEN);
    content[..end].is_ascii()
}

/// Decide text or binary. Never fails; falls through to Binary.
pub fn classify(name: &str, content: Option<&[u8]>, opts: &ClassifyOptions<'_>) -> FileFormat {
    classify_with_origin(name, content, opts).0
}

pub fn classify_with_origin(
    name: &str,
    content: Option<&[u8]>,
    opts: &ClassifyOptions<'_>,
) -> (FileFormat, FormatOrigin) {
    if opts.transmission.is_plaintext() {
        return (FileFormat::Text, FormatOrigin::Forced);
    }
    if let Some(format) = opts.override_format {
        return (format, FormatOrigin::Specified);
    }
    if let Some(format) = opts.table.lookup(name) {
        return (format, FormatOrigin::Extension);
    }
    // Remote bytes are only trusted through the extension or an override
    if opts.direction == Direction::Send {
        if let Some(bytes) = content {
            if looks_like_text(bytes) {
                return (FileFormat::Text, FormatOrigin::Content);
            }
        }
    }
    (FileFormat::Binary, FormatOrigin::Default)
}
