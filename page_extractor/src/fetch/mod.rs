//! Static page retrieval: HTTP GET with rotating user agents, escalating
//! timeouts and exponential backoff.

pub mod decode;

use async_trait::async_trait;
use backoff::{backoff::Backoff, future::retry_notify};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{self, HeaderValue};
pub use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{RetryConfig, TimeoutPair};
use crate::error::FetchError;

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Response of a single GET, before any status handling.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub declared_encoding: Option<String>,
}

/// One HTTP GET with explicit timeouts. Retrying is the caller's job.
#[async_trait]
pub trait StaticFetch: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        timeouts: TimeoutPair,
    ) -> Result<RawResponse, FetchError>;
}

/// [`StaticFetch`] backed by `reqwest`.
#[derive(Debug, Default, Clone)]
pub struct ReqwestFetcher;

#[async_trait]
impl StaticFetch for ReqwestFetcher {
    async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        timeouts: TimeoutPair,
    ) -> Result<RawResponse, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| request_error(url, e))?;

        let res = client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = res.status().as_u16();
        let declared_encoding = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(decode::charset_from_content_type);
        let body = res.bytes().await.map_err(|e| request_error(url, e))?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
            declared_encoding,
        })
    }
}

fn request_error(url: &str, err: reqwest::Error) -> FetchError {
    let url = url.to_string();
    let message = err.to_string();
    if err.is_timeout() {
        FetchError::Timeout { url, message }
    } else if err.is_connect() {
        FetchError::Connect { url, message }
    } else {
        FetchError::Request { url, message }
    }
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Browser-like request headers around `user_agent`.
pub fn browser_headers(user_agent: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(user_agent));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8,es;q=0.7"),
    );
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers
}

/// `base * 2^attempt` plus a random jitter below `max_jitter`.
pub fn backoff_delay(config: &RetryConfig, attempt: usize, max_jitter: Duration) -> Duration {
    let jitter = if max_jitter.is_zero() {
        Duration::ZERO
    } else {
        max_jitter.mul_f64(rand::thread_rng().gen_range(0.0..1.0))
    };
    config.base_delay_for(attempt) + jitter
}

/// Timeout-flavoured schedule; connection errors override it per attempt.
struct AttemptSchedule<'a> {
    config: &'a RetryConfig,
    attempts: &'a AtomicUsize,
}

impl Backoff for AttemptSchedule<'_> {
    fn next_backoff(&mut self) -> Option<Duration> {
        let made = self.attempts.load(Ordering::SeqCst);
        if made >= self.config.max_attempts.max(1) {
            return None;
        }
        Some(backoff_delay(
            self.config,
            made.saturating_sub(1),
            self.config.timeout_jitter,
        ))
    }
}

/// GET `url` until it answers 2xx, retrying timeouts and connection errors.
///
/// Non-2xx statuses and other request errors fail immediately; the last
/// transient error is returned once `max_attempts` are used up.
pub async fn fetch_with_retry(
    fetcher: &dyn StaticFetch,
    url: &str,
    config: &RetryConfig,
) -> Result<RawResponse, FetchError> {
    let attempt = &AtomicUsize::new(0);
    let max_attempts = config.max_attempts.max(1);

    let operation = move || async move {
        let n = attempt.fetch_add(1, Ordering::SeqCst);
        let timeouts = config.timeouts_for(n);
        info!(
            attempt = n + 1,
            max_attempts,
            connect_timeout = ?timeouts.connect,
            read_timeout = ?timeouts.read,
            "fetching {url}"
        );

        match fetcher.get(url, browser_headers(random_user_agent()), timeouts).await {
            Ok(res) if (200..300).contains(&res.status) => {
                info!(attempt = n + 1, status = res.status, bytes = res.body.len(), "fetched {url}");
                Ok(res)
            }
            Ok(res) => Err(backoff::Error::permanent(FetchError::HttpStatus {
                url: url.to_string(),
                status: res.status,
            })),
            Err(err) if err.is_transient() && n + 1 < max_attempts => match err {
                FetchError::Connect { .. } => {
                    let delay = backoff_delay(config, n, config.connect_jitter);
                    Err(backoff::Error::retry_after(err, delay))
                }
                _ => Err(backoff::Error::transient(err)),
            },
            Err(err) => Err(backoff::Error::permanent(err)),
        }
    };

    let schedule = AttemptSchedule {
        config,
        attempts: attempt,
    };
    retry_notify(schedule, operation, |err: FetchError, delay: Duration| {
        warn!(error = %err, ?delay, "fetch attempt failed, retrying");
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays a scripted sequence of outcomes and records the timeouts used.
    struct Scripted {
        outcomes: Mutex<Vec<Result<RawResponse, FetchError>>>,
        seen: Mutex<Vec<TimeoutPair>>,
    }

    impl Scripted {
        fn new(mut outcomes: Vec<Result<RawResponse, FetchError>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StaticFetch for Scripted {
        async fn get(
            &self,
            url: &str,
            headers: HeaderMap,
            timeouts: TimeoutPair,
        ) -> Result<RawResponse, FetchError> {
            assert!(USER_AGENTS.contains(&headers[header::USER_AGENT].to_str().unwrap()));
            self.seen.lock().unwrap().push(timeouts);
            self.outcomes.lock().unwrap().pop().unwrap_or_else(|| {
                Err(FetchError::Request {
                    url: url.to_string(),
                    message: "script exhausted".into(),
                })
            })
        }
    }

    fn ok(status: u16) -> Result<RawResponse, FetchError> {
        Ok(RawResponse {
            status,
            body: b"<html></html>".to_vec(),
            declared_encoding: None,
        })
    }

    fn timeout() -> Result<RawResponse, FetchError> {
        Err(FetchError::Timeout {
            url: "u".into(),
            message: "slow".into(),
        })
    }

    fn fast_config() -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(1),
            timeout_jitter: Duration::ZERO,
            connect_jitter: Duration::ZERO,
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn retries_timeouts_with_escalating_timeouts() {
        let fetcher = Scripted::new(vec![timeout(), timeout(), ok(200)]);
        let res = fetch_with_retry(&fetcher, "https://example.com", &fast_config())
            .await
            .unwrap();
        assert_eq!(res.status, 200);
        let seen = fetcher.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![TimeoutPair::secs(5, 10), TimeoutPair::secs(10, 15), TimeoutPair::secs(15, 25)]
        );
    }

    #[tokio::test]
    async fn gives_up_after_four_attempts() {
        let fetcher = Scripted::new(vec![timeout(), timeout(), timeout(), timeout(), ok(200)]);
        let err = fetch_with_retry(&fetcher, "https://example.com", &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
        assert_eq!(fetcher.seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn http_errors_are_not_retried() {
        let fetcher = Scripted::new(vec![ok(404), ok(200)]);
        let err = fetch_with_retry(&fetcher, "https://example.com", &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
        assert_eq!(fetcher.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn connection_errors_are_retried() {
        let connect = Err(FetchError::Connect {
            url: "u".into(),
            message: "refused".into(),
        });
        let fetcher = Scripted::new(vec![connect, ok(200)]);
        let res = fetch_with_retry(&fetcher, "https://example.com", &fast_config()).await;
        assert!(res.is_ok());
        assert_eq!(fetcher.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = RetryConfig::default();
        for attempt in 0..3 {
            let delay = backoff_delay(&config, attempt, Duration::from_secs(1));
            let base = config.base_delay_for(attempt);
            assert!(delay >= base && delay < base + Duration::from_secs(1));
        }
    }

    #[test]
    fn headers_ask_for_identity_encoding() {
        let headers = browser_headers(random_user_agent());
        assert_eq!(headers[header::ACCEPT_ENCODING], "identity");
        assert_eq!(headers["sec-fetch-mode"], "navigate");
    }
}
