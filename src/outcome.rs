//! The normalized address record and the terminal result of a race.

use core::fmt;

use crate::source::SourceError;

/// A normalized address, as returned by any [`Source`].
///
/// [`Source`]: crate::source::Source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "http", derive(serde::Serialize))]
pub struct Address {
    /// The postal code as reported by the source.
    pub identifier: String,
    /// Street name.
    pub address_line: String,
    /// Neighbourhood.
    pub district: String,
    /// City.
    pub city: String,
    /// State or region.
    pub region: String,
    /// The source which produced this record.
    pub source_name: String,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}, {}, {} - {} (via {})",
            self.identifier,
            self.address_line,
            self.district,
            self.city,
            self.region,
            self.source_name
        )
    }
}

/// The single terminal result of a race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The first source to answer without error.
    Success(Address),
    /// The first source to answer with an error, before any success.
    Failure(SourceError),
    /// The deadline elapsed before any source answered.
    TimedOut,
}

impl Outcome {
    /// Exit status used by `timeout(1)` when its command times out.
    pub const TIMED_OUT_EXIT_CODE: u8 = 124;

    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Name of the source which decided the race, if any.
    pub fn source_name(&self) -> Option<&str> {
        match self {
            Outcome::Success(address) => Some(&address.source_name),
            Outcome::Failure(err) => Some(err.source_name()),
            Outcome::TimedOut => None,
        }
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success(_) => 0,
            Outcome::Failure(_) => 1,
            Outcome::TimedOut => Self::TIMED_OUT_EXIT_CODE,
        }
    }

    /// Short machine-readable label.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(_) => "failure",
            Outcome::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(address) => write!(f, "{address}"),
            Outcome::Failure(err) => write!(f, "lookup failed: {err}"),
            Outcome::TimedOut => f.write_str("timed out: no source answered before the deadline"),
        }
    }
}
