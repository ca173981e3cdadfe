// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create the shared asynchronous HTTP client.
///
/// The timeout bounds every request so a hung origin or webhook cannot
/// stall a source's task.
pub fn create_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// GET `url`, failing on transport errors and non-success statuses.
async fn get(client: &reqwest::Client, url: &str, context: &str) -> Result<reqwest::Response> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::fetch(context, format!("request to {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::fetch(context, format!("{url} returned HTTP {status}")));
    }
    Ok(response)
}

/// GET `url` and return the body bytes.
///
/// Transport failures, timeouts and non-success statuses all surface as
/// [`AppError::Fetch`] tagged with `context`.
pub async fn fetch_bytes(client: &reqwest::Client, url: &str, context: &str) -> Result<Vec<u8>> {
    let bytes = get(client, url, context)
        .await?
        .bytes()
        .await
        .map_err(|e| AppError::fetch(context, format!("reading {url} failed: {e}")))?;
    Ok(bytes.to_vec())
}

/// GET `url` and return the body as text, decoded with the charset named
/// by the response's `Content-Type` (UTF-8 when absent).
pub async fn fetch_text(client: &reqwest::Client, url: &str, context: &str) -> Result<String> {
    get(client, url, context)
        .await?
        .text()
        .await
        .map_err(|e| AppError::fetch(context, format!("reading {url} failed: {e}")))
}
