use std::sync::Arc;

use futures_core::future::BoxFuture;
use serde::Deserialize;

use super::http;
use super::{ErrorKind, Query, Source, SourceError};
use crate::outcome::Address;
use crate::scope::Scope;

/// Lookups against [ViaCEP](https://viacep.com.br).
///
/// Issues `GET {base}/{query}/json/`. ViaCEP reports unknown postal codes
/// with a `200 OK` carrying `{"erro": true}`, which is surfaced as
/// [`ErrorKind::NotFound`].
#[derive(Debug, Clone)]
pub struct ViaCep {
    client: reqwest::Client,
    base_url: Arc<str>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Found(Found),
    Flagged { erro: serde_json::Value },
}

#[derive(Debug, Deserialize)]
struct Found {
    #[serde(default)]
    erro: Option<serde_json::Value>,
    cep: String,
    #[serde(default)]
    logradouro: Option<String>,
    #[serde(default)]
    bairro: Option<String>,
    localidade: String,
    uf: String,
}

impl ViaCep {
    /// The name reported in results.
    pub const NAME: &'static str = "ViaCEP";

    /// The public endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://viacep.com.br/ws";

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

/// Older deployments send `"erro": true`, newer ones `"erro": "true"`.
fn is_set(erro: &serde_json::Value) -> bool {
    match erro {
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::String(flag) => flag == "true",
        _ => false,
    }
}

impl Payload {
    fn into_address(self) -> Result<Address, SourceError> {
        let not_found = || SourceError::new(ViaCep::NAME, ErrorKind::NotFound, "not found");
        match self {
            Payload::Flagged { erro } if is_set(&erro) => Err(not_found()),
            Payload::Flagged { .. } => Err(SourceError::new(
                ViaCep::NAME,
                ErrorKind::Payload,
                "malformed payload: missing address fields",
            )),
            Payload::Found(found) if found.erro.as_ref().is_some_and(is_set) => Err(not_found()),
            Payload::Found(found) => Ok(Address {
                identifier: found.cep,
                address_line: found.logradouro.unwrap_or_default(),
                district: found.bairro.unwrap_or_default(),
                city: found.localidade,
                region: found.uf,
                source_name: ViaCep::NAME.to_owned(),
            }),
        }
    }
}

impl Source for ViaCep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fetch(
        &self,
        query: Query,
        scope: Scope,
    ) -> BoxFuture<'static, Result<Address, SourceError>> {
        let request = self.client.get(format!("{}/{}/json/", self.base_url, query));
        Box::pin(async move {
            let payload: Payload = http::get_json(Self::NAME, request, &scope).await?;
            payload.into_address()
        })
    }
}
