//! Shared HTTP plumbing for provider adapters: one pooled client per
//! provider, bounded GET retries with exponential backoff and jitter.

use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use tracing::warn;

use nthlayer_core::error::ProviderError;

/// Retry attempts for idempotent GETs.
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff between attempts.
const BASE_BACKOFF_MS: u64 = 100;

/// Build the pooled client a provider keeps for its lifetime.
pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("nthlayer/0.1")
        .build()
        .unwrap_or_default()
}

/// GET a JSON document with bounded retries. Only GETs are retried; 4xx
/// responses are permanent, 5xx and transport errors are transient.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<T, ProviderError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match send_once(client, provider, url, headers).await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < MAX_ATTEMPTS => {
                let backoff = BASE_BACKOFF_MS * 2_u64.pow(attempt - 1);
                let jitter = rand::thread_rng().gen_range(0..=backoff / 2);
                warn!(
                    "[{}] GET {} attempt {} failed ({}), retrying",
                    provider, url, attempt, error
                );
                tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
            }
            Err(error) => return Err(error),
        }
    }
}

async fn send_once<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<T, ProviderError> {
    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
                timeout_ms: 0,
            }
        } else if e.is_connect() {
            ProviderError::Misconfigured {
                provider: provider.to_string(),
                message: e.to_string(),
            }
        } else {
            ProviderError::Transient {
                provider: provider.to_string(),
                message: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if status.is_client_error() {
        return Err(ProviderError::Permanent {
            provider: provider.to_string(),
            message: format!("{url} returned {status}"),
        });
    }
    if !status.is_success() {
        return Err(ProviderError::Transient {
            provider: provider.to_string(),
            message: format!("{url} returned {status}"),
        });
    }

    response.json().await.map_err(|e| ProviderError::Permanent {
        provider: provider.to_string(),
        message: format!("malformed response from {url}: {e}"),
    })
}
