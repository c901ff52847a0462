/*!
 * Newline detection and conversion
 *
 * Conversion is a single left-to-right scan. At every position the source
 * conventions are tried longest first, so `\r\n` is never split into a CR
 * followed by an LF.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::Direction;
use crate::error::XferError;

/// A concrete newline byte pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NewlineConvention {
    Cr,
    Crlf,
    Lf,
    Lfcr,
}

impl NewlineConvention {
    /// Every convention, two-byte patterns first
    pub const LONGEST_FIRST: [NewlineConvention; 4] = [
        NewlineConvention::Crlf,
        NewlineConvention::Lfcr,
        NewlineConvention::Cr,
        NewlineConvention::Lf,
    ];

    /// CP/M consoles and files use CRLF
    pub const REMOTE: NewlineConvention = NewlineConvention::Crlf;

    pub fn bytes(self) -> &'static [u8] {
        match self {
            NewlineConvention::Cr => b"\r",
            NewlineConvention::Crlf => b"\r\n",
            NewlineConvention::Lf => b"\n",
            NewlineConvention::Lfcr => b"\n\r",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NewlineConvention::Cr => "CR",
            NewlineConvention::Crlf => "CRLF",
            NewlineConvention::Lf => "LF",
            NewlineConvention::Lfcr => "LFCR",
        }
    }

    /// The host's native text convention
    pub fn host() -> Self {
        if cfg!(windows) {
            NewlineConvention::Crlf
        } else {
            NewlineConvention::Lf
        }
    }

    fn matches_at(self, data: &[u8], pos: usize) -> bool {
        data[pos..].starts_with(self.bytes())
    }
}

impl fmt::Display for NewlineConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A newline as configured: a concrete convention or the direction-dependent `system`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NewlineSpec {
    Cr,
    Crlf,
    Lf,
    Lfcr,
    #[serde(rename = "system", alias = "SYSTEM")]
    System,
}

impl NewlineSpec {
    fn concrete(self) -> Option<NewlineConvention> {
        match self {
            NewlineSpec::Cr => Some(NewlineConvention::Cr),
            NewlineSpec::Crlf => Some(NewlineConvention::Crlf),
            NewlineSpec::Lf => Some(NewlineConvention::Lf),
            NewlineSpec::Lfcr => Some(NewlineConvention::Lfcr),
            NewlineSpec::System => None,
        }
    }

    /// As a source: host newline when sending, CP/M newline when receiving
    pub fn resolve_source(self, direction: Direction) -> NewlineConvention {
        self.concrete().unwrap_or(match direction {
            Direction::Send => NewlineConvention::host(),
            Direction::Receive => NewlineConvention::REMOTE,
        })
    }

    /// As a target: CP/M newline when sending, host newline when receiving
    pub fn resolve_target(self, direction: Direction) -> NewlineConvention {
        self.concrete().unwrap_or(match direction {
            Direction::Send => NewlineConvention::REMOTE,
            Direction::Receive => NewlineConvention::host(),
        })
    }
}

impl FromStr for NewlineSpec {
    type Err = XferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CR" => Ok(NewlineSpec::Cr),
            "CRLF" => Ok(NewlineSpec::Crlf),
            "LF" => Ok(NewlineSpec::Lf),
            "LFCR" => Ok(NewlineSpec::Lfcr),
            "SYSTEM" => Ok(NewlineSpec::System),
            other => Err(XferError::Config(format!("Unknown newline '{}'", other))),
        }
    }
}

/// The set of conventions a conversion replaces, kept longest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewlineSet {
    members: Vec<NewlineConvention>,
}

impl NewlineSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<I: IntoIterator<Item = NewlineConvention>>(conventions: I) -> Self {
        let wanted: Vec<NewlineConvention> = conventions.into_iter().collect();
        let members = NewlineConvention::LONGEST_FIRST
            .iter()
            .copied()
            .filter(|c| wanted.contains(c))
            .collect();
        Self { members }
    }

    /// Resolve configured specs once per job, for a fixed direction
    pub fn resolve(specs: &[NewlineSpec], direction: Direction) -> Self {
        Self::new(specs.iter().map(|s| s.resolve_source(direction)))
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, convention: NewlineConvention) -> bool {
        self.members.contains(&convention)
    }

    pub fn iter(&self) -> impl Iterator<Item = NewlineConvention> + '_ {
        self.members.iter().copied()
    }
}

/// Counts gathered while normalizing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewlineStats {
    /// Occurrences in the original payload, independent of the source set
    pub cr: usize,
    pub crlf: usize,
    pub lf: usize,
    pub lfcr: usize,

    /// Convention written, None when conversion was disabled
    pub target: Option<NewlineConvention>,

    /// Instances of the target convention in the converted payload
    pub final_count: usize,
}

impl NewlineStats {
    pub fn count(&self, convention: NewlineConvention) -> usize {
        match convention {
            NewlineConvention::Cr => self.cr,
            NewlineConvention::Crlf => self.crlf,
            NewlineConvention::Lf => self.lf,
            NewlineConvention::Lfcr => self.lfcr,
        }
    }

    fn bump(&mut self, convention: NewlineConvention) {
        match convention {
            NewlineConvention::Cr => self.cr += 1,
            NewlineConvention::Crlf => self.crlf += 1,
            NewlineConvention::Lf => self.lf += 1,
            NewlineConvention::Lfcr => self.lfcr += 1,
        }
    }

    pub fn total_original(&self) -> usize {
        self.cr + self.crlf + self.lf + self.lfcr
    }
}

/// Count each convention with a greedy longest-first scan
pub fn census(data: &[u8]) -> NewlineStats {
    let mut stats = NewlineStats::default();
    let mut pos = 0;
    while pos < data.len() {
        match NewlineConvention::LONGEST_FIRST
            .iter()
            .find(|c| c.matches_at(data, pos))
        {
            Some(convention) => {
                stats.bump(*convention);
                pos += convention.bytes().len();
            }
            None => pos += 1,
        }
    }
    stats
}

/// Count non-overlapping occurrences of `pattern`
pub fn count_occurrences(data: &[u8], pattern: &[u8]) -> usize {
    if pattern.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut pos = 0;
    while pos + pattern.len() <= data.len() {
        if &data[pos..pos + pattern.len()] == pattern {
            count += 1;
            pos += pattern.len();
        } else {
            pos += 1;
        }
    }
    count
}

/// Replace every source newline with the target newline.
///
/// An empty source set passes the payload through untouched and the target is
/// ignored (`stats.target` is `None`).
pub fn normalize(
    payload: &[u8],
    sources: &NewlineSet,
    target: NewlineConvention,
) -> (Vec<u8>, NewlineStats) {
    let mut stats = census(payload);

    if sources.is_empty() {
        return (payload.to_vec(), stats);
    }

    let replacement = target.bytes();
    let mut out = Vec::with_capacity(payload.len() + payload.len() / 16);
    let mut pos = 0;
    while pos < payload.len() {
        match sources.iter().find(|c| c.matches_at(payload, pos)) {
            Some(convention) => {
                out.extend_from_slice(replacement);
                pos += convention.bytes().len();
            }
            None => {
                out.push(payload[pos]);
                pos += 1;
            }
        }
    }

    stats.target = Some(target);
    stats.final_count = count_occurrences(&out, replacement);
    (out, stats)
}
