//! Discord webhook delivery.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;

use crate::error::{AppError, Result};
use crate::models::{DeliveryConfig, Item, Source, WebhookMessage};
use crate::utils::RetryPolicy;

/// Wait applied when a rate-limit response names no retry-after.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Delivers one item to its source's destination.
///
/// `Ok` means the destination acknowledged the message. Errors are
/// classified so the caller can tell a permanent refusal
/// ([`AppError::DeliveryRejected`]) from a failure worth retrying on a
/// later cycle.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn send(&self, source: &Source, item: &Item) -> Result<()>;
}

/// Result of a single POST.
#[derive(Debug)]
enum Outcome {
    Delivered,
    Transient(String),
    RateLimited(Duration),
    Rejected(u16, String),
}

impl Outcome {
    /// Final result when no further attempt will be made.
    fn into_result(self, attempts: u32) -> Result<()> {
        match self {
            Outcome::Delivered => Ok(()),
            Outcome::Transient(message) => Err(AppError::DeliveryExhausted { attempts, message }),
            Outcome::RateLimited(retry_after) => Err(AppError::RateLimited { retry_after }),
            Outcome::Rejected(status, message) => {
                Err(AppError::DeliveryRejected { status, message })
            }
        }
    }
}

/// Webhook sender with bounded retries.
pub struct WebhookClient {
    client: reqwest::Client,
    delivery: DeliveryConfig,
    policy: RetryPolicy,
}

impl WebhookClient {
    pub fn new(client: reqwest::Client, delivery: &DeliveryConfig) -> Self {
        Self {
            client,
            delivery: delivery.clone(),
            policy: RetryPolicy::from_config(delivery),
        }
    }

    fn max_rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.delivery.max_rate_limit_wait_secs)
    }

    async fn post_once(&self, webhook: &str, message: &WebhookMessage) -> Outcome {
        let response = match self.client.post(webhook).json(message).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => return Outcome::Rejected(0, e.to_string()),
            Err(e) => return Outcome::Transient(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return Outcome::Delivered;
        }

        let header_wait = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_seconds);
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = header_wait
                .or_else(|| body_retry_after(&body))
                .unwrap_or(DEFAULT_RETRY_AFTER);
            return Outcome::RateLimited(wait);
        }

        let message = format!("HTTP {status}: {}", body.trim());
        if status.is_client_error() {
            Outcome::Rejected(status.as_u16(), message)
        } else {
            Outcome::Transient(message)
        }
    }
}

#[async_trait]
impl Deliver for WebhookClient {
    async fn send(&self, source: &Source, item: &Item) -> Result<()> {
        let message = WebhookMessage::build(source, item, &self.delivery);
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.post_once(&source.webhook, &message).await {
                Outcome::Transient(reason) if self.policy.should_retry(attempt) => {
                    let delay = self.policy.backoff(attempt);
                    log::warn!(
                        "{}: delivery of {} failed (attempt {}/{}): {}; retrying in {:?}",
                        source.name,
                        item.id,
                        attempt,
                        self.policy.max_attempts,
                        reason,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Outcome::RateLimited(wait) => {
                    if wait > self.max_rate_limit_wait() {
                        return Err(AppError::RateLimited { retry_after: wait });
                    }
                    log::warn!("{}: rate limited, waiting {:?}", source.name, wait);
                    tokio::time::sleep(wait).await;

                    // One retry after honoring the wait; its outcome is final.
                    attempt += 1;
                    return self
                        .post_once(&source.webhook, &message)
                        .await
                        .into_result(attempt);
                }
                outcome => {
                    let result = outcome.into_result(attempt);
                    if result.is_ok() {
                        log::debug!(
                            "{}: delivered {} in {:?}",
                            source.name,
                            item.id,
                            started.elapsed()
                        );
                    }
                    return result;
                }
            }
        }
    }
}

/// Parse a seconds value, fractional or whole.
fn parse_seconds(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// Discord also reports the wait as `retry_after` in the JSON body.
fn body_retry_after(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let secs = value.get("retry_after")?.as_f64()?;
    parse_seconds(&secs.to_string())
}
