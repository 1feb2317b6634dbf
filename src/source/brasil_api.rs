use std::sync::Arc;

use futures_core::future::BoxFuture;
use serde::Deserialize;

use super::http;
use super::{Query, Source, SourceError};
use crate::outcome::Address;
use crate::scope::Scope;

/// Lookups against [BrasilAPI](https://brasilapi.com.br).
///
/// Issues `GET {base}/{query}`.
#[derive(Debug, Clone)]
pub struct BrasilApi {
    client: reqwest::Client,
    base_url: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    cep: String,
    state: String,
    city: String,
    #[serde(default)]
    neighborhood: Option<String>,
    #[serde(default)]
    street: Option<String>,
}

impl BrasilApi {
    /// The name reported in results.
    pub const NAME: &'static str = "BrasilAPI";

    /// The public endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://brasilapi.com.br/api/cep/v1";

    /// Create a source using the public endpoint.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, Self::DEFAULT_BASE_URL)
    }

    /// Create a source against a different endpoint.
    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: http::base_url(base_url).into(),
        }
    }
}

impl Payload {
    fn into_address(self) -> Address {
        Address {
            identifier: self.cep,
            address_line: self.street.unwrap_or_default(),
            district: self.neighborhood.unwrap_or_default(),
            city: self.city,
            region: self.state,
            source_name: BrasilApi::NAME.to_owned(),
        }
    }
}

impl Source for BrasilApi {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fetch(
        &self,
        query: Query,
        scope: Scope,
    ) -> BoxFuture<'static, Result<Address, SourceError>> {
        let request = self.client.get(format!("{}/{}", self.base_url, query));
        Box::pin(async move {
            let payload: Payload = http::get_json(Self::NAME, request, &scope).await?;
            Ok(payload.into_address())
        })
    }
}
