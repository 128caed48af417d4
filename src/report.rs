//! Rendering of mismatches at the output boundary.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use strum_macros::{Display, EnumString};

use crate::Mismatch;

/// How mismatches and the final count are written.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    /// `{ip hostname} reason` lines followed by `total mismatch: n`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Serialize)]
struct MismatchLine<'a> {
    ip: String,
    hostname: &'a str,
    kind: &'static str,
    timeout: bool,
    reason: String,
}

#[derive(Serialize)]
struct TotalLine {
    total_mismatch: usize,
}

/// Streams mismatches to a writer in the chosen format.
pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Reporter { out, format }
    }

    /// Writes one mismatch and flushes so it shows up as soon as it is found.
    pub fn mismatch(&mut self, mismatch: &Mismatch) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", mismatch)?,
            OutputFormat::Json => {
                let line = MismatchLine {
                    ip: mismatch.pair.ip.to_string(),
                    hostname: &mismatch.pair.hostname,
                    kind: mismatch.reason.kind(),
                    timeout: mismatch.reason.is_timeout(),
                    reason: mismatch.reason.to_string(),
                };
                serde_json::to_writer(&mut self.out, &line)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }

    pub fn total(&mut self, count: usize) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "total mismatch: {}", count)?,
            OutputFormat::Json => {
                serde_json::to_writer(
                    &mut self.out,
                    &TotalLine {
                        total_mismatch: count,
                    },
                )?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }
}
