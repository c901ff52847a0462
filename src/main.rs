/*!
 * rcxfer CLI - Command Line Interface
 *
 * Version: 0.3.0
 *
 * The serial device must already be configured (speed, flow control) with
 * `stty`; rcxfer only opens it for reading and writing.
 */

use clap::{Parser, ValueEnum};
use console::Term;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use rcxfer::{
    cli_progress::CliProgressRenderer,
    cli_style,
    config::{FileFormat, LogLevel, TransferConfig, TransmissionFormat},
    core::names::{self, AcceptSuggestion, RenamePrompt},
    core::newline::NewlineSpec,
    core::package::ChecksumKind,
    core::progress::ProgressPublisher,
    error::{Result, XferError},
    logging,
    output::OutputWriter,
    transport::{
        ClipboardTransport, EchoTransport, FileClipboard, SimulatedTransport, StreamTransport,
        Transport,
    },
    Direction, JobRequest, Orchestrator,
};

/// Port value selecting the clipboard instead of a device
const CLIPBOARD_PORT: &str = "clipboard";

#[derive(Parser)]
#[command(name = "rcxfer")]
#[command(version, about = "Transfer files to and from CP/M and BASIC retrocomputers over a serial link", long_about = None)]
struct Cli {
    /// Files to send, or remote names to receive (quote wildcards for remote expansion)
    #[arg(value_name = "FILE", required = true)]
    files: Vec<String>,

    /// Serial device, or "clipboard"; omit to simulate
    #[arg(short = 'p', long = "port", value_name = "DEVICE")]
    port: Option<String>,

    /// File used as the clipboard with --port clipboard
    #[arg(long = "clipboard-file", value_name = "FILE")]
    clipboard_file: Option<PathBuf>,

    /// Delay between transmitted characters in milliseconds
    #[arg(short = 'd', long = "delay", value_name = "MS")]
    delay: Option<u64>,

    /// Transmission format
    #[arg(short = 't', long = "transmission-format", value_enum)]
    transmission_format: Option<TransmissionArg>,

    /// Force the file format instead of inferring it
    #[arg(short = 'f', long = "file-format", value_enum)]
    file_format: Option<FileFormatArg>,

    /// CP/M user number
    #[arg(short = 'u', long = "user", value_parser = clap::value_parser!(u8).range(0..=15))]
    user: Option<u8>,

    /// Receive files from the remote instead of sending
    #[arg(short = 'r', long = "receive")]
    receive: bool,

    /// Echo wire traffic to the console
    #[arg(long = "echo", overrides_with = "no_echo")]
    echo: bool,

    /// Do not echo wire traffic
    #[arg(long = "no-echo")]
    no_echo: bool,

    /// Comma-separated newlines to convert (CR, LF, CRLF, LFCR, system); give none to disable conversion
    #[arg(long = "source-newlines", value_name = "NEWLINES", num_args = 0..=1, value_delimiter = ',', value_parser = NewlineSpec::from_str)]
    source_newlines: Option<Vec<NewlineSpec>>,

    /// Newline written in place of the source newlines
    #[arg(long = "target-newline", value_name = "NEWLINE", value_parser = NewlineSpec::from_str)]
    target_newline: Option<NewlineSpec>,

    /// Package checksum (additive16, length-sum8)
    #[arg(long = "checksum", value_parser = ChecksumKind::from_str)]
    checksum: Option<ChecksumKind>,

    /// Deadline for remote prompts in milliseconds
    #[arg(long = "prompt-timeout", value_name = "MS")]
    prompt_timeout: Option<u64>,

    /// Directory received files are written to
    #[arg(long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Accept suggested 8.3 names without asking
    #[arg(short = 'y', long = "yes")]
    yes: bool,

    /// Path to config file (overrides the default location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace) [default: warn]
    #[arg(long, value_enum)]
    log_level: Option<LogLevelArg>,

    /// Write logs to this file as JSON
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Enable verbose logging (equivalent to --log-level=debug)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Emit JSON Lines reports on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum TransmissionArg {
    Package,
    CpmPlaintext,
    BasicPlaintext,
}

impl From<TransmissionArg> for TransmissionFormat {
    fn from(arg: TransmissionArg) -> Self {
        match arg {
            TransmissionArg::Package => TransmissionFormat::Package,
            TransmissionArg::CpmPlaintext => TransmissionFormat::CpmPlaintext,
            TransmissionArg::BasicPlaintext => TransmissionFormat::BasicPlaintext,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum FileFormatArg {
    Text,
    Binary,
}

impl From<FileFormatArg> for FileFormat {
    fn from(arg: FileFormatArg) -> Self {
        match arg {
            FileFormatArg::Text => FileFormat::Text,
            FileFormatArg::Binary => FileFormat::Binary,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

/// Asks on the terminal, offering the suggestion as the default answer
struct DialoguerPrompt;

impl RenamePrompt for DialoguerPrompt {
    fn ask(&mut self, original: &str, suggested: &str) -> Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(format!("{} is not a valid CP/M name. Remote name", original))
            .default(suggested.to_string())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| XferError::Io(std::io::Error::other(e)))
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            cli_style::print_error(&e.to_string(), None);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn load_base_config(explicit: Option<&Path>) -> TransferConfig {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => TransferConfig::default_path().filter(|p| p.exists()),
    };
    match path {
        Some(path) => TransferConfig::from_file(&path).unwrap_or_else(|e| {
            cli_style::print_warning(&format!("Failed to load config file: {}", e));
            TransferConfig::default()
        }),
        None => TransferConfig::default(),
    }
}

fn apply_overrides(config: &mut TransferConfig, cli: &Cli) {
    if let Some(delay) = cli.delay {
        config.char_delay_ms = delay;
    }
    if let Some(format) = cli.transmission_format {
        config.transmission_format = format.into();
    }
    if let Some(format) = cli.file_format {
        config.file_format = Some(format.into());
    }
    if let Some(user) = cli.user {
        config.user = user;
    }
    if cli.echo {
        config.echo = true;
    }
    if cli.no_echo {
        config.echo = false;
    }
    if let Some(ref sources) = cli.source_newlines {
        config.source_newlines = sources.clone();
    }
    if let Some(target) = cli.target_newline {
        config.target_newline = target;
    }
    if let Some(checksum) = cli.checksum {
        config.checksum = checksum;
    }
    if let Some(timeout) = cli.prompt_timeout {
        config.prompt_timeout_ms = timeout;
    }
    if let Some(ref dir) = cli.output_dir {
        config.output_dir = Some(dir.clone());
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if let Some(ref log) = cli.log {
        config.log_file = Some(log.clone());
    }
    config.json |= cli.json;
    config.verbose |= cli.verbose;
}

fn default_clipboard_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rcxfer")
        .join("clipboard")
}

fn open_transport(cli: &Cli, echo: bool, output: &OutputWriter) -> Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match cli.port.as_deref() {
        None => Box::new(SimulatedTransport::new()),
        Some(CLIPBOARD_PORT) => {
            let path = cli
                .clipboard_file
                .clone()
                .unwrap_or_else(default_clipboard_file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            output.info(&format!("Clipboard file: {}", path.display()));
            Box::new(ClipboardTransport::new(FileClipboard::new(path)))
        }
        Some(device) => Box::new(StreamTransport::open(Path::new(device))?),
    };
    if echo {
        Ok(Box::new(EchoTransport::new(transport)))
    } else {
        Ok(transport)
    }
}

/// Expand send patterns the shell passed through unexpanded
fn expand_local(files: &[String]) -> Vec<JobRequest> {
    let mut requests = Vec::new();
    for file in files {
        if !names::has_wildcards(file) || Path::new(file).exists() {
            requests.push(JobRequest::new(file.clone()));
            continue;
        }
        let matches: Vec<PathBuf> = match glob::glob(file) {
            Ok(paths) => paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect(),
            Err(e) => {
                debug!("Not a glob pattern {}: {}", file, e);
                Vec::new()
            }
        };
        if matches.is_empty() {
            requests.push(JobRequest::new(file.clone()));
        } else {
            requests.extend(
                matches
                    .into_iter()
                    .map(|p| JobRequest::new(p.to_string_lossy().into_owned())),
            );
        }
    }
    requests
}

/// Receive names that still carry wildcards were quoted for remote expansion
fn remote_requests(files: &[String]) -> Vec<JobRequest> {
    files
        .iter()
        .map(|f| {
            if names::has_wildcards(f) {
                JobRequest::remote_pattern(f.clone())
            } else {
                JobRequest::new(f.clone())
            }
        })
        .collect()
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = load_base_config(cli.config.as_deref());
    apply_overrides(&mut config, &cli);
    config.validate()?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let output = OutputWriter::new(config.json, cli.port.clone());
    let direction = if cli.receive {
        Direction::Receive
    } else {
        Direction::Send
    };
    let requests = match direction {
        Direction::Send => expand_local(&cli.files),
        Direction::Receive => remote_requests(&cli.files),
    };

    // Echo output and JSON Lines both want the terminal to themselves
    let echo = config.echo && !config.json;
    let mut transport = open_transport(&cli, echo, &output).map_err(|e| match e {
        XferError::Io(io) => XferError::TransportUnusable(format!(
            "cannot open {}: {}",
            cli.port.as_deref().unwrap_or("transport"),
            io
        )),
        other => other,
    })?;

    let prompt: Box<dyn RenamePrompt> = if cli.yes || !Term::stderr().is_term() {
        Box::new(AcceptSuggestion)
    } else {
        Box::new(DialoguerPrompt)
    };

    let (publisher, renderer) = if config.json {
        (ProgressPublisher::noop(), None)
    } else {
        let (publisher, subscriber) = ProgressPublisher::unbounded();
        let renderer = CliProgressRenderer::new(subscriber, config.transmission_format)
            .with_spinner(!echo && Term::stderr().is_term())
            .with_verbose(config.verbose)
            .spawn();
        (publisher, Some(renderer))
    };

    let batch = {
        let mut orchestrator = Orchestrator::new(&config, &mut transport)
            .with_progress(publisher)
            .with_rename_prompt(prompt);
        orchestrator.run(direction, &requests)
    };

    if let Some(handle) = renderer {
        match handle.join() {
            Ok(Err(e)) => warn!("Progress renderer failed: {}", e),
            Err(_) => warn!("Progress renderer panicked"),
            Ok(Ok(())) => {}
        }
    }

    if let Err(e) = transport.close() {
        warn!("Closing the transport failed: {}", e);
    }

    output.batch_report(&batch);

    Ok(batch.exit_code())
}
