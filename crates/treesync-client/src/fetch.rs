//! Bounded HTTP GETs against the backend.
//!
//! Nothing in here returns an error. Each request ends in a [`FetchOutcome`];
//! callers decide whether a failure is fatal (the asset listing) or degrades
//! to missing data (everything else).

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;
use url::Url;

use crate::retry::{RetryPolicy, RetryReport};

/// Result of a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// 2xx with a decodable body.
    Payload(T),
    /// Any other status code.
    Status(u16),
    /// The attempt deadline elapsed.
    Timeout,
    /// Connection-level failure.
    Transport(String),
    /// The body did not match the expected shape.
    Decode(String),
}

impl<T> FetchOutcome<T> {
    /// Timeouts and transport errors may succeed on another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }

    #[must_use]
    pub fn into_payload(self) -> Option<T> {
        match self {
            Self::Payload(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_payload(&self) -> bool {
        matches!(self, Self::Payload(_))
    }
}

impl<T> fmt::Display for FetchOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload(_) => f.write_str("ok"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::Timeout => f.write_str("timed out"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::Decode(message) => write!(f, "invalid response body: {message}"),
        }
    }
}

/// Identifies a request in log lines.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext<'a> {
    /// What is being fetched, e.g. `"relations from"`.
    pub request: &'a str,
    /// Asset or device the request is about.
    pub subject: &'a str,
}

impl<'a> FetchContext<'a> {
    #[must_use]
    pub fn new(request: &'a str, subject: &'a str) -> Self {
        Self { request, subject }
    }
}

/// Issues GETs with per-attempt deadlines over a shared connection pool.
#[derive(Debug, Clone)]
pub struct RelationFetcher {
    http: reqwest::Client,
}

impl RelationFetcher {
    /// Wraps a client that already carries the authorization header.
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// One GET bounded by `timeout`, covering both the response and the body.
    pub async fn fetch_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> FetchOutcome<T> {
        match tokio::time::timeout(timeout, self.send(url)).await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::Timeout,
        }
    }

    async fn send<T: DeserializeOwned>(&self, url: &Url) -> FetchOutcome<T> {
        let response = match self.http.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return FetchOutcome::Timeout,
            Err(e) => return FetchOutcome::Transport(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::Status(status.as_u16());
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return FetchOutcome::Timeout,
            Err(e) => return FetchOutcome::Transport(e.to_string()),
        };
        match serde_json::from_slice(&body) {
            Ok(value) => FetchOutcome::Payload(value),
            Err(e) => FetchOutcome::Decode(e.to_string()),
        }
    }

    /// Fetches a list under `policy`; every failure degrades to an empty list.
    pub async fn fetch_with_retry<T: DeserializeOwned>(
        &self,
        url: &Url,
        policy: &RetryPolicy,
        context: FetchContext<'_>,
    ) -> Vec<T> {
        let report = self.fetch_with_report(url, policy, context).await;

        if report.exhausted {
            warn!(
                request = context.request,
                subject = context.subject,
                attempts = report.attempts,
                "all retries exhausted, continuing without this data"
            );
            return Vec::new();
        }
        match report.outcome {
            FetchOutcome::Payload(items) => items,
            other => {
                log_failure(context, url, &other);
                Vec::new()
            }
        }
    }

    /// Runs the retried list fetch and returns the full [`RetryReport`], so an
    /// exhausted request can be told apart from a genuinely empty answer.
    pub async fn fetch_with_report<T: DeserializeOwned>(
        &self,
        url: &Url,
        policy: &RetryPolicy,
        context: FetchContext<'_>,
    ) -> RetryReport<Vec<T>> {
        policy
            .run(move |attempt, timeout| async move {
                let outcome = self.fetch_once::<Vec<T>>(url, timeout).await;
                if outcome.is_retryable() {
                    warn!(
                        request = context.request,
                        subject = context.subject,
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts(),
                        timeout_ms = timeout.as_millis() as u64,
                        "attempt failed: {outcome}"
                    );
                }
                outcome
            })
            .await
    }

    /// Single attempt; failures are logged and mapped to `None`.
    pub async fn fetch_optional<T: DeserializeOwned>(
        &self,
        url: &Url,
        timeout: Duration,
        context: FetchContext<'_>,
    ) -> Option<T> {
        let outcome = self.fetch_once(url, timeout).await;
        if !outcome.is_payload() {
            log_failure(context, url, &outcome);
        }
        outcome.into_payload()
    }
}

fn log_failure<T>(context: FetchContext<'_>, url: &Url, outcome: &FetchOutcome<T>) {
    warn!(
        request = context.request,
        subject = context.subject,
        path = url.path(),
        "request failed: {outcome}"
    );
}
