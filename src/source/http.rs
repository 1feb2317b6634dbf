//! Shared plumbing for the JSON-over-HTTP providers.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::{ErrorKind, SourceError};
use crate::future::FutureExt as _;
use crate::scope::Scope;

/// Send `request` and decode a JSON body of type `T`.
///
/// The request is dropped as soon as `scope` is cancelled or expires, so it
/// never outlives the scope's deadline.
pub(super) async fn get_json<T>(
    source_name: &str,
    request: RequestBuilder,
    scope: &Scope,
) -> Result<T, SourceError>
where
    T: DeserializeOwned,
{
    let exchange = async {
        let response = request
            .send()
            .await
            .map_err(|err| transport_error(source_name, &err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::new(source_name, ErrorKind::NotFound, "not found"));
        }
        if !status.is_success() {
            return Err(SourceError::new(
                source_name,
                ErrorKind::Status(status.as_u16()),
                format!("unexpected status {status}"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| transport_error(source_name, &err))?;
        serde_json::from_slice(&body).map_err(|err| {
            SourceError::new(source_name, ErrorKind::Payload, format!("malformed payload: {err}"))
        })
    };

    match exchange.until_cancelled(scope).await {
        Ok(result) => result,
        Err(reason) => {
            tracing::debug!(source = source_name, %reason, "request interrupted");
            Err(SourceError::cancelled(source_name, reason))
        }
    }
}

fn transport_error(source_name: &str, err: &reqwest::Error) -> SourceError {
    let message = if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    SourceError::new(source_name, ErrorKind::Network, message)
}

/// Trim a trailing slash so `{base}/{path}` never doubles it.
pub(super) fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}
