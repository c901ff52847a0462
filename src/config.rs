/*!
 * Configuration types for rcxfer
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::classify::ExtensionTable;
use crate::core::newline::NewlineSpec;
use crate::core::package::ChecksumKind;
use crate::core::session::SessionTiming;
use crate::error::{Result, XferError};

/// How file content travels over the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransmissionFormat {
    /// Hex package understood by DOWNLOAD.COM / UPLOAD.COM
    #[default]
    Package,

    /// Typed into ED (send) or captured from TYPE (receive)
    CpmPlaintext,

    /// Typed into a running BASIC interpreter or captured from LIST
    BasicPlaintext,
}

impl TransmissionFormat {
    /// Plaintext formats always carry text
    pub fn is_plaintext(&self) -> bool {
        !matches!(self, TransmissionFormat::Package)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransmissionFormat::Package => "package",
            TransmissionFormat::CpmPlaintext => "cpm-plaintext",
            TransmissionFormat::BasicPlaintext => "basic-plaintext",
        }
    }
}

impl fmt::Display for TransmissionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransmissionFormat {
    type Err = XferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "package" => Ok(TransmissionFormat::Package),
            "cpm-plaintext" => Ok(TransmissionFormat::CpmPlaintext),
            "basic-plaintext" => Ok(TransmissionFormat::BasicPlaintext),
            other => Err(XferError::Config(format!(
                "Unknown transmission format '{}'",
                other
            ))),
        }
    }
}

/// Text or binary treatment of file content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Text,
    Binary,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Text => "text",
            FileFormat::Binary => "binary",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = XferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(FileFormat::Text),
            "binary" => Ok(FileFormat::Binary),
            other => Err(XferError::Config(format!("Unknown file format '{}'", other))),
        }
    }
}

/// Which way a transfer moves data relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Send,
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => write!(f, "send"),
            Direction::Receive => write!(f, "receive"),
        }
    }
}

/// Main configuration for a transfer run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Transmission format (package, cpm-plaintext, basic-plaintext)
    #[serde(default)]
    pub transmission_format: TransmissionFormat,

    /// Force text or binary handling (None = infer)
    #[serde(default)]
    pub file_format: Option<FileFormat>,

    /// CP/M user number (0-15)
    #[serde(default)]
    pub user: u8,

    /// Newlines to convert; empty disables conversion
    #[serde(default = "default_source_newlines")]
    pub source_newlines: Vec<NewlineSpec>,

    /// Newline the sources convert to
    #[serde(default = "default_target_newline")]
    pub target_newline: NewlineSpec,

    /// Delay between transmitted characters in milliseconds (0 = none)
    #[serde(default)]
    pub char_delay_ms: u64,

    /// Pause between consecutive jobs in milliseconds
    #[serde(default = "default_file_delay_ms")]
    pub file_delay_ms: u64,

    /// Deadline for command prompts in milliseconds
    #[serde(default = "default_prompt_timeout_ms")]
    pub prompt_timeout_ms: u64,

    /// Deadline for the acknowledgment after a payload in milliseconds
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Deadline for a full TYPE/LIST/UPLOAD capture in milliseconds
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,

    /// Quiet period that confirms an end-of-buffer prompt, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Read granularity while awaiting a pattern, in milliseconds
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,

    /// Package checksum strategy
    #[serde(default)]
    pub checksum: ChecksumKind,

    /// Extension lookup used by the file classifier
    #[serde(default)]
    pub extensions: ExtensionTable,

    /// Where received files are written (None = current directory)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Echo wire traffic to the console
    #[serde(default = "default_true")]
    pub echo: bool,

    /// Emit JSON Lines reports instead of the human summary
    #[serde(default)]
    pub json: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            transmission_format: TransmissionFormat::Package,
            file_format: None,
            user: 0,
            source_newlines: default_source_newlines(),
            target_newline: default_target_newline(),
            char_delay_ms: 0,
            file_delay_ms: default_file_delay_ms(),
            prompt_timeout_ms: default_prompt_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            capture_timeout_ms: default_capture_timeout_ms(),
            settle_ms: default_settle_ms(),
            poll_ms: default_poll_ms(),
            checksum: ChecksumKind::default(),
            extensions: ExtensionTable::default(),
            output_dir: None,
            echo: true,
            json: false,
            log_level: LogLevel::Warn,
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    #[default]
    Warn,

    /// Info, warnings, and errors
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_source_newlines() -> Vec<NewlineSpec> {
    vec![NewlineSpec::System]
}

fn default_target_newline() -> NewlineSpec {
    NewlineSpec::System
}

fn default_file_delay_ms() -> u64 {
    1000
}

fn default_prompt_timeout_ms() -> u64 {
    5_000
}

fn default_ack_timeout_ms() -> u64 {
    30_000
}

fn default_capture_timeout_ms() -> u64 {
    120_000
}

fn default_settle_ms() -> u64 {
    250
}

fn default_poll_ms() -> u64 {
    50
}

/// Highest CP/M user number
pub const MAX_USER: u8 = 15;

impl TransferConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TransferConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| XferError::Config(format!("TOML serialize error: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default config location: `<config_dir>/rcxfer/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rcxfer").join("config.toml"))
    }

    /// Reject values the engine cannot act on
    pub fn validate(&self) -> Result<()> {
        if self.user > MAX_USER {
            return Err(XferError::Config(format!(
                "User number {} out of range 0-{}",
                self.user, MAX_USER
            )));
        }
        if self.poll_ms == 0 {
            return Err(XferError::Config("poll_ms must be positive".to_string()));
        }
        if self.prompt_timeout_ms == 0 || self.ack_timeout_ms == 0 || self.capture_timeout_ms == 0
        {
            return Err(XferError::Config("Timeouts must be positive".to_string()));
        }
        Ok(())
    }

    pub fn char_delay(&self) -> Duration {
        Duration::from_millis(self.char_delay_ms)
    }

    pub fn file_delay(&self) -> Duration {
        Duration::from_millis(self.file_delay_ms)
    }

    /// Session deadlines derived from the millisecond fields
    pub fn timing(&self) -> SessionTiming {
        SessionTiming {
            prompt: Duration::from_millis(self.prompt_timeout_ms),
            ack: Duration::from_millis(self.ack_timeout_ms),
            capture: Duration::from_millis(self.capture_timeout_ms),
            settle: Duration::from_millis(self.settle_ms),
            poll: Duration::from_millis(self.poll_ms),
        }
    }

    /// Directory received files land in
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Configuration for a remote that answers slowly (no flow control)
    pub fn slow_remote_preset() -> Self {
        Self {
            char_delay_ms: 5,
            file_delay_ms: 2000,
            prompt_timeout_ms: 15_000,
            ack_timeout_ms: 120_000,
            settle_ms: 500,
            ..Default::default()
        }
    }
}
