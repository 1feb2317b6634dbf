//! Data sources.
//!
//! A [`Source`] adapts one provider to a uniform lookup capability. Sources
//! are stateless: the same instance can be raced concurrently and repeatedly.
//!
//! With the `http` feature enabled this module also provides the two public
//! Brazilian postal-code providers, [`BrasilApi`] and [`ViaCep`].
//!
//! # Implementing a source
//!
//! ```
//! use cep_race::outcome::Address;
//! use cep_race::prelude::*;
//! use cep_race::scope::Scope;
//! use cep_race::source::{Query, Source, SourceError};
//! use futures_core::future::BoxFuture;
//!
//! struct Fixed;
//!
//! impl Source for Fixed {
//!     fn name(&self) -> &str {
//!         "fixed"
//!     }
//!
//!     fn fetch(
//!         &self,
//!         query: Query,
//!         scope: Scope,
//!     ) -> BoxFuture<'static, Result<Address, SourceError>> {
//!         Box::pin(async move {
//!             let lookup = async {
//!                 Address {
//!                     identifier: query.to_string(),
//!                     source_name: "fixed".into(),
//!                     ..Address::default()
//!                 }
//!             };
//!             lookup
//!                 .until_cancelled(&scope)
//!                 .await
//!                 .map_err(|reason| SourceError::cancelled("fixed", reason))
//!         })
//!     }
//! }
//! ```

use core::fmt;
use std::sync::Arc;

use futures_core::future::BoxFuture;

use crate::outcome::Address;
use crate::scope::{CancelReason, Scope};

#[cfg(feature = "http")]
pub use brasil_api::BrasilApi;
#[cfg(feature = "http")]
pub use via_cep::ViaCep;

#[cfg(feature = "http")]
mod brasil_api;
#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
mod via_cep;

/// A provider of address lookups.
///
/// Implementations must honor `scope`: once it is cancelled, the returned
/// future must resolve promptly with [`ErrorKind::Cancelled`] instead of
/// waiting for the underlying I/O. A provider response that cannot be
/// normalized into a complete [`Address`] is an error, never a partially
/// filled record.
pub trait Source: Send + Sync {
    /// The name recorded in [`Address::source_name`] and in errors.
    fn name(&self) -> &str;

    /// Look up `query`.
    fn fetch(&self, query: Query, scope: Scope) -> BoxFuture<'static, Result<Address, SourceError>>;
}

impl<S: Source + ?Sized> Source for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        query: Query,
        scope: Scope,
    ) -> BoxFuture<'static, Result<Address, SourceError>> {
        (**self).fetch(query, scope)
    }
}

/// The key being looked up, passed identically to every source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(Arc<str>);

impl Query {
    /// Create a new query.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// The raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Query {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Query {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

/// What went wrong in a [`SourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request could not be sent or the connection failed.
    Network,
    /// The provider answered with an unexpected status code.
    Status(u16),
    /// The provider does not know the query.
    NotFound,
    /// The response could not be decoded into an address.
    Payload,
    /// The scope was cancelled before the lookup completed.
    Cancelled(CancelReason),
    /// The source panicked.
    Panicked,
}

/// A failed lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{source_name}: {message}")]
pub struct SourceError {
    source_name: String,
    kind: ErrorKind,
    message: String,
}

impl SourceError {
    /// Create a new error for the source called `source_name`.
    pub fn new(
        source_name: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            message: message.into(),
        }
    }

    /// The lookup was interrupted by its scope.
    pub fn cancelled(source_name: impl Into<String>, reason: CancelReason) -> Self {
        Self::new(source_name, ErrorKind::Cancelled(reason), reason.to_string())
    }

    /// The source panicked while fetching.
    pub fn panicked(source_name: impl Into<String>) -> Self {
        Self::new(source_name, ErrorKind::Panicked, "source panicked")
    }

    /// Name of the failing source.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The error category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable description.
    pub fn message(&self) -> &str {
        &self.message
    }
}
