//! Race a postal-code lookup across multiple providers and keep the first
//! answer.
//!
//! One query is sent concurrently to every [`Source`]. Whichever answers
//! first decides the race, the rest are cancelled, and a hard deadline bounds
//! the whole thing. Every race produces exactly one [`Outcome`]:
//!
//! - [`Outcome::Success`]: the first source to answer without error.
//! - [`Outcome::Failure`]: the first source to answer with an error (see
//!   [`race::Policy`]).
//! - [`Outcome::TimedOut`]: the deadline elapsed before any source answered.
//!
//! # Building blocks
//!
//! - [`scope::Scope`]: a cancellation scope with parent/child derivation and
//!   an optional deadline.
//! - [`future::FutureExt::until_cancelled`]: ties any future to a scope.
//! - [`race::Race`]: spawns one task per source and resolves the race.
//! - [`report::Reporter`]: renders the outcome.
//!
//! # Examples
//!
//! ```no_run
//! use cep_race::config::RaceConfig;
//! use cep_race::report::{Reporter, TextReporter};
//! use cep_race::scope::Scope;
//!
//! # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RaceConfig::default();
//! let race = config.build(&reqwest::Client::new());
//!
//! let outcome = race.run(&config.query, &Scope::new()).await?;
//! TextReporter::new(std::io::stdout()).report(&outcome)?;
//! # Ok(()) }
//! ```
//!
//! [`Source`]: source::Source
//! [`Outcome`]: outcome::Outcome
//! [`Outcome::Success`]: outcome::Outcome::Success
//! [`Outcome::Failure`]: outcome::Outcome::Failure
//! [`Outcome::TimedOut`]: outcome::Outcome::TimedOut

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

/// The cep-race prelude.
pub mod prelude {
    pub use super::future::FutureExt as _;
    pub use super::report::Reporter as _;
    pub use super::source::Source as _;
}

#[cfg(feature = "http")]
pub mod config;
pub mod future;
pub mod outcome;
pub mod race;
pub mod report;
pub mod scope;
pub mod source;

pub use outcome::{Address, Outcome};
pub use race::{race, Policy, Race, RaceError};
pub use scope::Scope;
pub use source::{Query, Source, SourceError};
