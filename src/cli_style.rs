/*!
 * rcxfer CLI style system
 *
 * Themed text, icons and the batch summary table. Human output goes to
 * stderr so stdout stays clean for JSON Lines.
 */

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};

use crate::config::Direction;
use crate::core::job::{BatchReport, JobOutcome, JobReport};

// ============================================================================
// THEME COLORS
// ============================================================================

pub struct Theme;

impl Theme {
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red().bold()
    }

    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }

    pub fn header<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan().bold()
    }
}

pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const SIMULATED: &'static str = "○";
    pub const ARROW_RIGHT: &'static str = "→";
    pub const ARROW_LEFT: &'static str = "←";
}

// ============================================================================
// TABLES
// ============================================================================

pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn outcome_cell(report: &JobReport) -> Cell {
    match &report.outcome {
        JobOutcome::Completed => Cell::new(format!("{} done", Icons::SUCCESS)).fg(Color::Green),
        JobOutcome::Simulated => {
            Cell::new(format!("{} simulated", Icons::SIMULATED)).fg(Color::DarkGrey)
        }
        JobOutcome::Failed(e) => Cell::new(format!("{} {}", Icons::ERROR, e.kind()))
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
    }
}

/// One row per job, then a totals row
pub fn batch_summary_table(batch: &BatchReport) -> Table {
    let mut table = create_table();
    let arrow = match batch.direction {
        Direction::Send => Icons::ARROW_RIGHT,
        Direction::Receive => Icons::ARROW_LEFT,
    };
    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Local").add_attribute(Attribute::Bold),
        Cell::new(arrow),
        Cell::new("Remote").add_attribute(Attribute::Bold),
        Cell::new("Format").add_attribute(Attribute::Bold),
        Cell::new("Bytes").add_attribute(Attribute::Bold),
        Cell::new("Time").add_attribute(Attribute::Bold),
        Cell::new("Result").add_attribute(Attribute::Bold),
    ]);

    for report in &batch.jobs {
        let job = &report.job;
        table.add_row(vec![
            Cell::new(job.index),
            Cell::new(job.local_path.display()),
            Cell::new(arrow).fg(Color::DarkGrey),
            Cell::new(&job.remote_name).fg(Color::Cyan),
            Cell::new(format!("{}/{}", job.transmission, job.file_format)),
            Cell::new(report.stats.file_bytes),
            Cell::new(format_duration(report.elapsed.as_secs_f64())),
            outcome_cell(report),
        ]);
    }

    let totals = if batch.failed() > 0 {
        Cell::new(format!("{} ok, {} failed", batch.succeeded(), batch.failed()))
            .fg(Color::Red)
            .add_attribute(Attribute::Bold)
    } else {
        Cell::new(format!("{} ok", batch.succeeded()))
            .fg(Color::Green)
            .add_attribute(Attribute::Bold)
    };
    table.add_row(vec![
        Cell::new(""),
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_bytes(batch.file_bytes() as u64)),
        Cell::new(format_duration(batch.elapsed.as_secs_f64())),
        totals,
    ]);

    table
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let base = 1024.0_f64;
    let exp = (bytes_f.ln() / base.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f / base.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.2} {}", value, UNITS[exp])
    }
}

/// Format duration into human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours, mins)
    }
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING.to_string()),
        Theme::warning(message)
    );
}

pub fn print_info(message: &str) {
    eprintln!("{} {}", Theme::primary(Icons::INFO.to_string()), message);
}
