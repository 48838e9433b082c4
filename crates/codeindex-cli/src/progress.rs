//! Rendering of refresh progress

use crate::app::OutputFormat;
use anyhow::Result;
use codeindex_core::{IndexingProgressUpdate, IndexingStatus};
use std::io::{self, Write};

/// Prints progress updates as a single rewritten line or as JSON lines
pub struct ProgressReporter {
    format: OutputFormat,
    last_status: Option<IndexingStatus>,
}

impl ProgressReporter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            last_status: None,
        }
    }

    pub fn report(&mut self, update: &IndexingProgressUpdate) -> Result<()> {
        self.last_status = Some(update.status);

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(update)?);
            }
            OutputFormat::Cli => {
                let line = format!(
                    "[{:>3.0}%] {:<9} {}",
                    update.progress * 100.0,
                    update.status,
                    update.desc
                );
                if update.status.is_terminal() {
                    eprint!("\r{:<80}\r", "");
                    println!("{}", line);
                } else {
                    eprint!("\r{:<80.80}", line);
                    io::stderr().flush().ok();
                }
            }
        }
        Ok(())
    }

    /// Status of the last update reported, if any
    pub fn last_status(&self) -> Option<IndexingStatus> {
        self.last_status
    }
}
