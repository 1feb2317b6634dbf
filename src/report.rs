//! Rendering outcomes.
//!
//! A [`Reporter`] turns the single [`Outcome`] of a race into output. It
//! holds no race logic.

use std::io::{self, Write};

use crate::outcome::Outcome;

/// Presents the outcome of a race.
pub trait Reporter {
    /// Render `outcome`.
    fn report(&mut self, outcome: &Outcome) -> io::Result<()>;
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, outcome: &Outcome) -> io::Result<()> {
        (**self).report(outcome)
    }
}

/// Writes one human-readable line per outcome.
#[derive(Debug)]
pub struct TextReporter<W> {
    writer: W,
}

impl<W: Write> TextReporter<W> {
    /// Create a new instance of `TextReporter`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn report(&mut self, outcome: &Outcome) -> io::Result<()> {
        writeln!(self.writer, "{outcome}")?;
        self.writer.flush()
    }
}

/// Writes one JSON object per outcome.
///
/// ```text
/// {"outcome":"success","address":{"identifier":"01153000",...}}
/// {"outcome":"failure","source":"ViaCEP","error":"not found"}
/// {"outcome":"timed_out"}
/// ```
#[cfg(feature = "http")]
#[derive(Debug)]
pub struct JsonReporter<W> {
    writer: W,
}

#[cfg(feature = "http")]
impl<W: Write> JsonReporter<W> {
    /// Create a new instance of `JsonReporter`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(feature = "http")]
impl<W: Write> Reporter for JsonReporter<W> {
    fn report(&mut self, outcome: &Outcome) -> io::Result<()> {
        let value = match outcome {
            Outcome::Success(address) => serde_json::json!({
                "outcome": outcome.kind(),
                "address": address,
            }),
            Outcome::Failure(err) => serde_json::json!({
                "outcome": outcome.kind(),
                "source": err.source_name(),
                "error": err.message(),
            }),
            Outcome::TimedOut => serde_json::json!({ "outcome": outcome.kind() }),
        };
        serde_json::to_writer(&mut self.writer, &value)?;
        writeln!(self.writer)?;
        self.writer.flush()
    }
}
