//! Rate-limited fetch client.
//!
//! A transport policy wrapper: a global in-flight limit, a fixed delay before
//! every fetch after the first, and bounded retries. It knows nothing about
//! what it fetches. The network and the clock are both injected so the policy
//! can be tested without either.

pub mod retry;

use crate::config::{MigrationConfig, ScrapeConfig};
use crate::error::MigrationError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub use retry::{AttemptError, Backoff, RetryPolicy, default_retryable};

#[derive(Debug, Error)]
pub enum FetchError {
    /// The resource does not exist. Never retried.
    #[error("not found: {url} (HTTP {status})")]
    NotFound { url: String, status: u16 },

    #[error("fetch of {url} failed after {attempts} attempt(s): {last}")]
    Failed {
        url: String,
        attempts: u32,
        last: AttemptError,
    },

    /// The client itself could not be built or used.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<FetchError> for MigrationError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound { url, .. } => MigrationError::FetchNotFound { url },
            FetchError::Failed {
                url,
                attempts,
                last,
            } => MigrationError::FetchTransientFailure {
                url,
                attempts,
                last: last.to_string(),
            },
            FetchError::Transport(message) => MigrationError::FetchTransientFailure {
                url: String::new(),
                attempts: 0,
                last: message,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// One HTTP GET, no policy.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse, AttemptError>;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// reqwest-backed transport carrying the registry session headers.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ScrapeConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );
        if let Some(cookies) = config.cookies.as_deref().filter(|c| !c.trim().is_empty()) {
            let value = HeaderValue::from_str(cookies.trim())
                .map_err(|e| FetchError::Transport(format!("invalid cookie header: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<FetchResponse, AttemptError> {
        let to_attempt = |e: reqwest::Error| AttemptError::Transport {
            timeout: e.is_timeout(),
            message: e.to_string(),
        };
        let response = self.client.get(url).send().await.map_err(to_attempt)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(to_attempt)?;
        Ok(FetchResponse { status, body })
    }
}

/// Counters surfaced in the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    pub requests: u64,
    pub retries: u64,
    pub not_found: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    retries: AtomicU64,
    not_found: AtomicU64,
    failures: AtomicU64,
}

pub struct FetchClient<T = HttpTransport, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
    limiter: Semaphore,
    request_delay: Duration,
    started: AtomicBool,
    counters: Counters,
}

impl FetchClient<HttpTransport, TokioSleeper> {
    /// Production client configured from the run configuration.
    pub fn from_config(config: &MigrationConfig) -> Result<Self, FetchError> {
        Ok(Self::new(
            HttpTransport::new(&config.scrape)?,
            TokioSleeper,
            RetryPolicy::fixed(
                config.retry_attempts,
                Duration::from_millis(config.retry_delay_ms),
            ),
            config.max_concurrent_requests,
            Duration::from_millis(config.request_delay_ms),
        ))
    }
}

impl<T: Transport, S: Sleeper> FetchClient<T, S> {
    pub fn new(
        transport: T,
        sleeper: S,
        policy: RetryPolicy,
        max_concurrent: usize,
        request_delay: Duration,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
            limiter: Semaphore::new(max_concurrent.max(1)),
            request_delay,
            started: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            not_found: self.counters.not_found.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Fetch `url` and return its body.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if self.started.swap(true, Ordering::SeqCst) && !self.request_delay.is_zero() {
            self.sleeper.sleep(self.request_delay).await;
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.counters.requests.fetch_add(1, Ordering::Relaxed);

            let err = match self.transport.get(url).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    debug!(url, attempt, bytes = response.body.len(), "fetched");
                    return Ok(response.body);
                }
                Ok(response) if response.status == 404 || response.status == 410 => {
                    self.counters.not_found.fetch_add(1, Ordering::Relaxed);
                    debug!(url, status = response.status, "not found");
                    return Err(FetchError::NotFound {
                        url: url.to_string(),
                        status: response.status,
                    });
                }
                Ok(response) => AttemptError::Status(response.status),
                Err(err) => err,
            };

            if !self.policy.should_retry(attempt, &err) {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(url, attempts = attempt, error = %err, "fetch failed");
                return Err(FetchError::Failed {
                    url: url.to_string(),
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.policy.backoff.delay(attempt);
            self.counters.retries.fetch_add(1, Ordering::Relaxed);
            warn!(
                url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "fetch attempt failed, retrying"
            );
            self.sleeper.sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned statuses and records every URL requested.
    struct ScriptedTransport {
        statuses: Mutex<VecDeque<u16>>,
        fallback: u16,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(statuses: &[u16], fallback: u16) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                fallback,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &str) -> Result<FetchResponse, AttemptError> {
            self.calls.lock().unwrap().push(url.to_string());
            let status = self.statuses.lock().unwrap().pop_front().unwrap_or(self.fallback);
            Ok(FetchResponse {
                status,
                body: format!("body {status}"),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn client(
        transport: ScriptedTransport,
        retries: u32,
    ) -> FetchClient<ScriptedTransport, RecordingSleeper> {
        FetchClient::new(
            transport,
            RecordingSleeper::default(),
            RetryPolicy::fixed(retries, Duration::from_millis(5000)),
            2,
            Duration::from_millis(1000),
        )
    }

    #[tokio::test]
    async fn test_404_is_never_retried() {
        let client = client(ScriptedTransport::new(&[404], 200), 3);
        let err = client.fetch("https://registry.test/kompanija/1").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { status: 404, .. }));
        assert_eq!(client.stats().retries, 0);
        assert_eq!(client.stats().not_found, 1);
        assert_eq!(client.transport.calls(), 1);

        let err: MigrationError = err.into();
        assert!(matches!(err, MigrationError::FetchNotFound { .. }));
    }

    #[tokio::test]
    async fn test_500_retries_then_fails() {
        let client = client(ScriptedTransport::new(&[], 500), 3);
        let err = client.fetch("https://registry.test/kompanija/2").await.unwrap_err();
        match &err {
            FetchError::Failed { attempts, last, .. } => {
                assert_eq!(*attempts, 4);
                assert_eq!(*last, AttemptError::Status(500));
            }
            other => panic!("unexpected error {other:?}"),
        }
        let stats = client.stats();
        assert_eq!(stats.retries, 3);
        assert_eq!(stats.requests, 4);
        assert_eq!(stats.failures, 1);
        assert_eq!(
            *client.sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_millis(5000); 3]
        );

        let err: MigrationError = err.into();
        assert!(matches!(
            err,
            MigrationError::FetchTransientFailure { attempts: 4, .. }
        ));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let client = client(ScriptedTransport::new(&[503, 200], 200), 3);
        let body = client.fetch("https://registry.test/a").await.unwrap();
        assert_eq!(body, "body 200");
        assert_eq!(client.stats().retries, 1);
    }

    #[tokio::test]
    async fn test_other_client_errors_are_terminal() {
        let client = client(ScriptedTransport::new(&[403], 200), 3);
        let err = client.fetch("https://registry.test/a").await.unwrap_err();
        assert!(matches!(err, FetchError::Failed { attempts: 1, .. }));
        assert_eq!(client.stats().retries, 0);
    }

    #[tokio::test]
    async fn test_delay_before_every_fetch_after_the_first() {
        let client = client(ScriptedTransport::new(&[], 200), 0);
        for id in 0..3 {
            client.fetch(&format!("https://registry.test/{id}")).await.unwrap();
        }
        assert_eq!(
            *client.sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_millis(1000); 2]
        );
    }
}
