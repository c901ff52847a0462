/*!
 * Package codec: the hex frame read by DOWNLOAD.COM and written by UPLOAD.COM
 *
 * Wire form: `:` + uppercase hex of the padded payload + `>` + four hex
 * digits of check value. The payload is padded with NUL to a multiple of
 * 128 bytes (one CP/M record) and the check value covers the padded bytes.
 */

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Result, XferError};

/// CP/M record size
pub const BLOCK_SIZE: usize = 128;

/// Byte appended to reach a whole record
pub const PAD_BYTE: u8 = 0x00;

/// CP/M end-of-file marker, written by ED and some loaders
pub const CPM_EOF: u8 = 0x1A;

/// Length of `>CCCC`
pub const CHECKSUM_SUFFIX_LEN: usize = 5;

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([0-9A-Fa-f\s]*)>([0-9A-Fa-f]{4})").unwrap());

/// Padding bytes needed to fill the last record (0 when already aligned)
pub fn padding_for(len: usize) -> usize {
    (BLOCK_SIZE - len % BLOCK_SIZE) % BLOCK_SIZE
}

pub fn pad(payload: &[u8]) -> Vec<u8> {
    let mut padded = Vec::with_capacity(payload.len() + padding_for(payload.len()));
    padded.extend_from_slice(payload);
    padded.resize(payload.len() + padding_for(payload.len()), PAD_BYTE);
    padded
}

/// Drop trailing NUL and SUB bytes left over from record padding
pub fn strip_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| *b != PAD_BYTE && *b != CPM_EOF)
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Check value computed over a padded payload
pub trait ChecksumStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn compute(&self, padded: &[u8]) -> u16;
}

/// 16-bit additive sum of every byte
#[derive(Debug, Clone, Copy, Default)]
pub struct Additive16;

impl ChecksumStrategy for Additive16 {
    fn name(&self) -> &'static str {
        "additive16"
    }

    fn compute(&self, padded: &[u8]) -> u16 {
        padded
            .iter()
            .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)))
    }
}

/// Low byte of the length, then low byte of the sum (DOWNLOAD.COM's check)
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthSum8;

impl ChecksumStrategy for LengthSum8 {
    fn name(&self) -> &'static str {
        "length-sum8"
    }

    fn compute(&self, padded: &[u8]) -> u16 {
        let len = (padded.len() & 0xFF) as u16;
        let sum = padded
            .iter()
            .fold(0u8, |acc, b| acc.wrapping_add(*b));
        (len << 8) | u16::from(sum)
    }
}

/// Configurable selector for the check value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumKind {
    #[default]
    Additive16,
    LengthSum8,
}

impl ChecksumKind {
    pub fn strategy(self) -> &'static dyn ChecksumStrategy {
        match self {
            ChecksumKind::Additive16 => &Additive16,
            ChecksumKind::LengthSum8 => &LengthSum8,
        }
    }
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy().name())
    }
}

impl FromStr for ChecksumKind {
    type Err = XferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "additive16" | "sum16" => Ok(ChecksumKind::Additive16),
            "length-sum8" | "download" => Ok(ChecksumKind::LengthSum8),
            other => Err(XferError::Config(format!(
                "Unknown checksum strategy '{}'",
                other
            ))),
        }
    }
}

/// An encoded package, ready for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFrame {
    padded: Vec<u8>,
    original_len: usize,
    checksum: u16,
}

impl PackageFrame {
    /// Pad and checksum with the default additive strategy
    pub fn encode(payload: &[u8]) -> Self {
        Self::encode_with(payload, &Additive16)
    }

    pub fn encode_with(payload: &[u8], strategy: &dyn ChecksumStrategy) -> Self {
        let padded = pad(payload);
        let checksum = strategy.compute(&padded);
        Self {
            padded,
            original_len: payload.len(),
            checksum,
        }
    }

    pub fn padded(&self) -> &[u8] {
        &self.padded
    }

    pub fn original_len(&self) -> usize {
        self.original_len
    }

    pub fn padding(&self) -> usize {
        self.padded.len() - self.original_len
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Uppercase hex digits of the padded payload, no separators
    pub fn hex(&self) -> String {
        hex::encode_upper(&self.padded)
    }

    /// `:` + hex + `>` + checksum
    pub fn wire_payload(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.wire_len());
        wire.push(b':');
        wire.extend_from_slice(self.hex().as_bytes());
        wire.extend_from_slice(format!(">{:04X}", self.checksum).as_bytes());
        wire
    }

    pub fn wire_len(&self) -> usize {
        1 + self.padded.len() * 2 + CHECKSUM_SUFFIX_LEN
    }
}

/// Decode hex digits and verify the additive checksum
pub fn decode(hex_stream: &[u8], expected_checksum: u16) -> Result<Vec<u8>> {
    decode_with(hex_stream, expected_checksum, &Additive16)
}

/// Decode hex digits (whitespace tolerated) and verify with `strategy`
pub fn decode_with(
    hex_stream: &[u8],
    expected_checksum: u16,
    strategy: &dyn ChecksumStrategy,
) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_stream
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let bytes = hex::decode(&digits)
        .map_err(|e| XferError::MalformedFrame(format!("bad hex payload: {}", e)))?;
    let actual = strategy.compute(&bytes);
    if actual != expected_checksum {
        return Err(XferError::ChecksumMismatch {
            expected: expected_checksum,
            actual,
        });
    }
    Ok(bytes)
}

/// A frame located inside captured remote output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Hex digits between `:` and `>`, possibly with whitespace
    pub hex: Vec<u8>,
    pub checksum: u16,
    /// Offset just past the checksum digits
    pub end: usize,
}

/// Find the first `:HEX>CCCC` frame in `capture`
pub fn find_frame(capture: &[u8]) -> Option<RawFrame> {
    let caps = FRAME_RE.captures(capture)?;
    let whole = caps.get(0)?;
    let digits = caps.get(1)?.as_bytes().to_vec();
    let check = std::str::from_utf8(caps.get(2)?.as_bytes()).ok()?;
    let checksum = u16::from_str_radix(check, 16).ok()?;
    Some(RawFrame {
        hex: digits,
        checksum,
        end: whole.end(),
    })
}

/// Regex that matches a complete frame, for awaiting one on the wire
pub fn frame_regex() -> &'static Regex {
    &FRAME_RE
}
