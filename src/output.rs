//! Reports for the two verbs, as text or JSON.

use std::io::{self, Write};

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::codec::{DecodeOutcome, EncodeOutcome, MARKER_MESSAGE};

/// Writes command reports in the selected format.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    /// Gives the underlying writer back.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn writeln(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", text)
    }

    fn write_json<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        self.writeln(&json)
    }

    fn write_paths(&mut self, paths: &[String]) -> io::Result<()> {
        for path in paths {
            self.writeln(&format!("  {}", path))?;
        }
        Ok(())
    }

    pub fn write_encode(&mut self, outcome: &EncodeOutcome) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.write_json(outcome)?,
            OutputFormat::Text => match outcome {
                EncodeOutcome::NothingToEncode => {
                    self.writeln("No unmerged paths, nothing to encode.")?;
                }
                EncodeOutcome::Encoded {
                    paths,
                    records,
                    bogus_paths,
                } => {
                    self.writeln(&format!(
                        "Encoded {} unmerged {} for {} {} as \"{}\":",
                        records,
                        plural(*records, "entry", "entries"),
                        paths.len(),
                        plural(paths.len(), "path", "paths"),
                        MARKER_MESSAGE
                    ))?;
                    self.write_paths(bogus_paths)?;
                }
            },
        }
        self.writer.flush()
    }

    pub fn write_decode(&mut self, outcome: &DecodeOutcome) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.write_json(outcome)?,
            OutputFormat::Text => match outcome {
                DecodeOutcome::NotMarker => {
                    self.writeln("HEAD is not a marker commit, nothing to decode.")?;
                }
                DecodeOutcome::Decoded {
                    paths,
                    records,
                    preserved,
                } => {
                    self.writeln(&format!(
                        "Restored {} unmerged {} for {} {}:",
                        records,
                        plural(*records, "entry", "entries"),
                        paths.len(),
                        plural(paths.len(), "path", "paths"),
                    ))?;
                    self.write_paths(paths)?;
                    if !preserved.is_empty() {
                        self.writeln("Kept working-tree content of:")?;
                        self.write_paths(preserved)?;
                    }
                }
            },
        }
        self.writer.flush()
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 { one } else { many }
}
