/*!
 * Per-job byte and newline statistics
 */

use serde::Serialize;

use crate::config::{FileFormat, TransmissionFormat};
use crate::core::newline::{NewlineConvention, NewlineStats};

/// Counters gathered while a job runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    /// Local file size (sent) or bytes written locally (received)
    pub file_bytes: usize,
    /// Bytes written to the transport, commands included
    pub transmitted_bytes: usize,
    /// Bytes read from the transport
    pub received_bytes: usize,
    /// Length of the `:HEX>CCCC` payload, package sends only
    pub package_bytes: Option<usize>,
    /// NUL bytes added to fill the last record
    pub padding_bytes: usize,
    /// Present for text files
    pub newlines: Option<NewlineStats>,
}

impl TransferStats {
    /// Indented report lines in the console summary
    pub fn report_lines(&self, transmission: TransmissionFormat, format: FileFormat) -> Vec<String> {
        let mut lines = vec![format!("File size:         {:>10}", self.file_bytes)];
        if transmission == TransmissionFormat::Package {
            lines.push(format!("Bytes of padding:  {:>10}", self.padding_bytes));
            if let Some(package) = self.package_bytes {
                lines.push(format!("Package size:      {:>10}", package));
            }
        }
        lines.push(format!("Transmission size: {:>10}", self.transmitted_bytes));
        if self.received_bytes > 0 {
            lines.push(format!("Received size:     {:>10}", self.received_bytes));
        }
        if format == FileFormat::Text {
            if let Some(ref nl) = self.newlines {
                for convention in NewlineConvention::LONGEST_FIRST {
                    lines.push(format!(
                        "Initial {:<4} newlines: {:>6}",
                        convention.name(),
                        nl.count(convention)
                    ));
                }
                match nl.target {
                    Some(target) => lines.push(format!(
                        "Final   {:<4} newlines: {:>6}",
                        target.name(),
                        nl.final_count
                    )),
                    None => lines.push("Newline conversion disabled".to_string()),
                }
            }
        }
        lines
    }
}
