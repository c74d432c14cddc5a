use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::Mode;

/// (connect, read) timeout pair for one static fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPair {
    pub connect: Duration,
    pub read: Duration,
}

impl TimeoutPair {
    pub const fn secs(connect: u64, read: u64) -> Self {
        Self {
            connect: Duration::from_secs(connect),
            read: Duration::from_secs(read),
        }
    }
}

/// Retry schedule for static fetches.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay: Duration,
    /// Upper bound of the random jitter added after a timeout.
    pub timeout_jitter: Duration,
    /// Upper bound of the random jitter added after a connection error.
    pub connect_jitter: Duration,
    /// Escalating timeouts; attempts past the end reuse the last pair.
    pub timeouts: Vec<TimeoutPair>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            timeout_jitter: Duration::from_secs(1),
            connect_jitter: Duration::from_secs(2),
            timeouts: vec![
                TimeoutPair::secs(5, 10),
                TimeoutPair::secs(10, 15),
                TimeoutPair::secs(15, 25),
                TimeoutPair::secs(20, 30),
            ],
        }
    }
}

impl RetryConfig {
    pub fn timeouts_for(&self, attempt: usize) -> TimeoutPair {
        self.timeouts
            .get(attempt)
            .or_else(|| self.timeouts.last())
            .copied()
            .unwrap_or(TimeoutPair::secs(20, 30))
    }

    /// `base * 2^attempt`, before jitter.
    pub fn base_delay_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Waits and endpoints of the WebDriver path.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub page_load_timeout: Duration,
    pub ready_timeout: Duration,
    pub ready_poll: Duration,
    pub dynamic_content_wait: Duration,
    pub popup_wait: Duration,
    pub click_pause: Duration,
    pub scroll_pause: Duration,
    pub max_scrolls: usize,
    pub top_pause: Duration,
    pub settle: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            page_load_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(15),
            ready_poll: Duration::from_millis(500),
            dynamic_content_wait: Duration::from_secs(3),
            popup_wait: Duration::from_secs(3),
            click_pause: Duration::from_secs(1),
            scroll_pause: Duration::from_secs(2),
            max_scrolls: 5,
            top_pause: Duration::from_secs(1),
            settle: Duration::from_secs(7),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub default_mode: Mode,
    /// Wall-clock budget for one extraction, browser release excluded.
    pub deadline: Duration,
    pub retry: RetryConfig,
    pub render: RenderConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            default_mode: Mode::Static,
            deadline: Duration::from_secs(90),
            retry: RetryConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Load overrides from the environment (and `.env` when present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(mode) = env::var("EXTRACTION_MODE") {
            config.default_mode = mode
                .parse()
                .map_err(anyhow::Error::msg)
                .context("EXTRACTION_MODE must be `static` or `rendered`")?;
        }
        if let Ok(url) = env::var("WEBDRIVER_URL") {
            config.render.webdriver_url = url;
        }
        if let Ok(secs) = env::var("EXTRACTION_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .context("EXTRACTION_TIMEOUT_SECS must be a whole number of seconds")?;
            config.deadline = Duration::from_secs(secs);
        }
        if let Ok(headless) = env::var("WEBDRIVER_HEADLESS") {
            config.render.headless = !matches!(headless.as_str(), "0" | "false" | "no");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_pairs_escalate_then_cap() {
        let retry = RetryConfig::default();
        assert_eq!(retry.timeouts_for(0), TimeoutPair::secs(5, 10));
        assert_eq!(retry.timeouts_for(1), TimeoutPair::secs(10, 15));
        assert_eq!(retry.timeouts_for(3), TimeoutPair::secs(20, 30));
        assert_eq!(retry.timeouts_for(9), TimeoutPair::secs(20, 30));
    }

    #[test]
    fn base_delay_doubles_per_attempt() {
        let retry = RetryConfig::default();
        assert_eq!(retry.base_delay_for(0), Duration::from_secs(1));
        assert_eq!(retry.base_delay_for(1), Duration::from_secs(2));
        assert_eq!(retry.base_delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn defaults_match_render_timings() {
        let render = RenderConfig::default();
        assert_eq!(render.page_load_timeout, Duration::from_secs(30));
        assert_eq!(render.ready_timeout, Duration::from_secs(15));
        assert_eq!(render.max_scrolls, 5);
        assert_eq!(ExtractorConfig::default().default_mode, Mode::Static);
    }
}
