//! The race coordinator.
//!
//! A [`Race`] runs one [`Query`] against a fixed set of [`Source`]s
//! concurrently and resolves to exactly one [`Outcome`]:
//!
//! | Outcome              | When                                                 |
//! | ---                  | ---                                                  |
//! | `Success(address)`   | The first source to answer without error.            |
//! | `Failure(error)`     | The first source to answer with an error, see [`Policy`]. |
//! | `TimedOut`           | The deadline elapsed before any source answered.     |
//!
//! Each source runs in its own tokio task and reports over a bounded queue
//! with room for one report per source, so reporting never blocks. Once the
//! race is decided its scope is cancelled, which stops every source still
//! running. Reports arriving after that are dropped.
//!
//! # Examples
//!
//! ```
//! use cep_race::outcome::{Address, Outcome};
//! use cep_race::race::Race;
//! use cep_race::scope::Scope;
//! use cep_race::source::{Query, Source, SourceError};
//! use futures_core::future::BoxFuture;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Echo;
//!
//! impl Source for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn fetch(
//!         &self,
//!         query: Query,
//!         _: Scope,
//!     ) -> BoxFuture<'static, Result<Address, SourceError>> {
//!         Box::pin(async move {
//!             Ok(Address {
//!                 identifier: query.to_string(),
//!                 source_name: "echo".into(),
//!                 ..Address::default()
//!             })
//!         })
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let sources: Vec<Arc<dyn Source>> = vec![Arc::new(Echo)];
//! let race = Race::new(sources, Duration::from_secs(1));
//!
//! let outcome = race.run(&Query::from("06341650"), &Scope::new()).await?;
//! assert_eq!(outcome.source_name(), Some("echo"));
//! # Ok::<(), cep_race::race::RaceError>(())
//! # }).unwrap();
//! ```

use core::fmt;
use core::str::FromStr;
use core::time::Duration;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::outcome::Outcome;
use crate::scope::Scope;
use crate::source::{Query, Source};

pub use error::RaceError;
pub use resolve::Resolve;

mod error;
mod resolve;
mod task;

/// When a failed lookup decides the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Policy {
    /// The first answer decides the race, success or failure.
    ///
    /// A fast failing source can mask a slower source which would have
    /// succeeded before the deadline.
    #[default]
    FailFast,
    /// A failure only decides the race once every source has failed. Any
    /// success before the deadline wins; the first failure is reported
    /// otherwise.
    AwaitAllOrSuccess,
}

impl Policy {
    /// The name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::FailFast => "fail-fast",
            Policy::AwaitAllOrSuccess => "await-all-or-success",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown [`Policy`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown policy `{0}`, expected `fail-fast` or `await-all-or-success`")]
pub struct ParsePolicyError(String);

impl FromStr for Policy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(Policy::FailFast),
            "await-all-or-success" => Ok(Policy::AwaitAllOrSuccess),
            other => Err(ParsePolicyError(other.to_owned())),
        }
    }
}

/// Races a query against a set of sources under a shared deadline.
#[derive(Clone)]
pub struct Race {
    sources: Vec<Arc<dyn Source>>,
    timeout: Duration,
    policy: Policy,
}

impl Race {
    /// Create a new race with the default [`Policy`].
    pub fn new<I>(sources: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Source>>,
    {
        Self {
            sources: sources.into_iter().collect(),
            timeout,
            policy: Policy::default(),
        }
    }

    /// Set the policy deciding when a failure ends the race.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// The race timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of sources raced.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if there is nothing to race.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Start the race, spawning one task per source.
    ///
    /// The race scope is derived from `parent`: cancelling `parent` aborts
    /// the race, and a deadline on `parent` earlier than this race's own
    /// timeout applies to it too.
    ///
    /// Input is validated before anything is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::NoSources`] or [`RaceError::InvalidTimeout`] for
    /// invalid input, and [`RaceError::NoRuntime`] when called outside of a
    /// tokio runtime.
    pub fn start(&self, query: &Query, parent: &Scope) -> Result<Resolve, RaceError> {
        if self.sources.is_empty() {
            return Err(RaceError::NoSources);
        }
        if self.timeout.is_zero() {
            return Err(RaceError::InvalidTimeout);
        }
        let runtime = Handle::try_current().map_err(|_| RaceError::NoRuntime)?;

        let scope = parent.with_timeout(self.timeout);
        let (sender, reports) = mpsc::channel(self.sources.len());
        tracing::debug!(
            query = %query,
            sources = self.sources.len(),
            timeout = ?self.timeout,
            policy = %self.policy,
            "starting race"
        );

        for (index, source) in self.sources.iter().enumerate() {
            runtime.spawn(task::run_source(
                index,
                source.clone(),
                query.clone(),
                scope.clone(),
                sender.clone(),
            ));
        }

        Ok(Resolve::new(scope, reports, self.policy, self.sources.len()))
    }

    /// Run the race to completion.
    ///
    /// # Errors
    ///
    /// See [`Race::start`]. Additionally returns [`RaceError::Aborted`] if
    /// `parent` is cancelled before the race resolves.
    pub async fn run(&self, query: &Query, parent: &Scope) -> Result<Outcome, RaceError> {
        self.start(query, parent)?.await
    }
}

impl fmt::Debug for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Race")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Race `query` against `sources` with the default policy.
///
/// Shorthand for [`Race::run`] under a fresh root scope.
pub async fn race<I>(query: &Query, sources: I, timeout: Duration) -> Result<Outcome, RaceError>
where
    I: IntoIterator<Item = Arc<dyn Source>>,
{
    Race::new(sources, timeout).run(query, &Scope::new()).await
}
