//! Shared HTTP plumbing for vendor clients.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::FetchError;

/// Per-request timeout applied by the HTTP client itself.
const HTTP_TIMEOUT_SECS: u64 = 30;

pub(crate) fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send a request and decode a JSON body, mapping every failure mode into
/// a [`FetchError`] for `provider`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(provider, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(provider, e))?;

    if !status.is_success() {
        debug!(provider, status = status.as_u16(), "vendor returned error status");
        return Err(FetchError::from_status(provider, status, body));
    }

    serde_json::from_str(&body).map_err(|e| FetchError::Parse {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}
