//! Transcript rendering

use crate::config::Format;
use crate::error::CliError;
use std::io::{self, Write};
use tickdb_core::{Event, EventSink};

const FRAME: &str = "*************************************";

/// Writes coordinator events as text or JSON lines
///
/// The coordinator cannot handle write failures, so the first one is kept
/// and reported by [`TranscriptWriter::finish`]; later events are dropped.
pub struct TranscriptWriter<W: Write> {
    out: W,
    format: Format,
    error: Option<CliError>,
}

impl<W: Write> TranscriptWriter<W> {
    /// Create a writer over `out`
    pub fn new(out: W, format: Format) -> Self {
        Self {
            out,
            format,
            error: None,
        }
    }

    fn write_event(&mut self, event: &Event) -> Result<(), CliError> {
        match self.format {
            Format::Text => match event {
                Event::Operation { text, .. } => {
                    write!(self.out, "\n{FRAME}\n{text}\n{FRAME}\n")?;
                }
                other => writeln!(self.out, "{other}")?,
            },
            Format::Json => {
                serde_json::to_writer(&mut self.out, event)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    /// Flush and hand back the writer, or the first error seen
    pub fn finish(mut self) -> Result<W, CliError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> EventSink for TranscriptWriter<W> {
    fn emit(&mut self, event: Event) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.write_event(&event) {
            tracing::error!(%err, "transcript write failed");
            self.error = Some(err);
        }
    }
}

/// Writer that copies everything to two destinations
pub struct Tee<A: Write, B: Write> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    /// Combine two writers
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}
