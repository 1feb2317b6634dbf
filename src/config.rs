//! Race configuration.
//!
//! A [`RaceConfig`] holds every setting of one lookup and builds the
//! matching [`Race`].

use core::fmt;
use core::str::FromStr;
use core::time::Duration;

use std::sync::Arc;

use crate::race::{Policy, Race};
use crate::source::{BrasilApi, Query, Source, ViaCep};

/// The providers this crate ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SourceKind {
    /// <https://brasilapi.com.br>
    BrasilApi,
    /// <https://viacep.com.br>
    ViaCep,
}

impl SourceKind {
    /// Every known provider.
    pub const ALL: [SourceKind; 2] = [SourceKind::BrasilApi, SourceKind::ViaCep];

    /// The name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::BrasilApi => "brasil-api",
            SourceKind::ViaCep => "via-cep",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown [`SourceKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source `{0}`, expected `brasil-api` or `via-cep`")]
pub struct ParseSourceKindError(String);

impl FromStr for SourceKind {
    type Err = ParseSourceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brasil-api" => Ok(SourceKind::BrasilApi),
            "via-cep" => Ok(SourceKind::ViaCep),
            other => Err(ParseSourceKindError(other.to_owned())),
        }
    }
}

/// Everything needed to run one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceConfig {
    /// The postal code to look up.
    pub query: Query,
    /// How long to wait for any source.
    pub timeout: Duration,
    /// When a failure decides the race.
    pub policy: Policy,
    /// Which providers to race. Duplicates are raced once.
    pub sources: Vec<SourceKind>,
    /// Base URL for [`SourceKind::BrasilApi`].
    pub brasil_api_url: String,
    /// Base URL for [`SourceKind::ViaCep`].
    pub via_cep_url: String,
}

impl RaceConfig {
    /// The postal code looked up when none is given.
    pub const DEFAULT_QUERY: &'static str = "06341650";

    /// The race timeout used when none is given.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    /// The configured sources in order, without duplicates.
    pub fn source_kinds(&self) -> Vec<SourceKind> {
        let mut kinds = Vec::with_capacity(self.sources.len());
        for kind in &self.sources {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    /// Build the race described by this configuration.
    pub fn build(&self, client: &reqwest::Client) -> Race {
        let sources = self.source_kinds().into_iter().map(|kind| -> Arc<dyn Source> {
            match kind {
                SourceKind::BrasilApi => {
                    Arc::new(BrasilApi::with_base_url(client.clone(), &self.brasil_api_url))
                }
                SourceKind::ViaCep => {
                    Arc::new(ViaCep::with_base_url(client.clone(), &self.via_cep_url))
                }
            }
        });
        Race::new(sources, self.timeout).policy(self.policy)
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            query: Query::from(Self::DEFAULT_QUERY),
            timeout: Self::DEFAULT_TIMEOUT,
            policy: Policy::default(),
            sources: SourceKind::ALL.to_vec(),
            brasil_api_url: BrasilApi::DEFAULT_BASE_URL.to_owned(),
            via_cep_url: ViaCep::DEFAULT_BASE_URL.to_owned(),
        }
    }
}
