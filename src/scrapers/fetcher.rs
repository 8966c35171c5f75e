use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::app::ports::HttpClientPort;
use crate::config::FetchConfig;
use crate::error::{Result, ScoutError};
use crate::metrics::FetchMetrics;
use crate::scrapers::html::{host_of, truncate_chars};
use crate::scrapers::rate_limiter::DomainRateLimiter;
use crate::types::FetchedPage;

/// Rate-limited, retrying page fetcher with a robots.txt gate.
pub struct Fetcher {
    http: Arc<dyn HttpClientPort>,
    limiter: DomainRateLimiter,
    config: FetchConfig,
    robots_cache: Mutex<HashMap<String, bool>>,
}

impl Fetcher {
    pub fn new(http: Arc<dyn HttpClientPort>, limiter: DomainRateLimiter, config: FetchConfig) -> Self {
        Self {
            http,
            limiter,
            config,
            robots_cache: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let domain = host_of(url).ok_or_else(|| ScoutError::fetch(url, "URL has no host", None))?;

        if self.config.respect_robots && !self.robots_allowed(url, &domain).await {
            FetchMetrics::record_robots_blocked();
            return Err(ScoutError::RobotsDisallowed { url: url.to_string() });
        }

        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = String::new();
        let mut last_status = None;

        for attempt in 0..max_attempts {
            self.limiter.acquire(&domain).await;
            let retries_left = attempt + 1 < max_attempts;

            match self.http.get(url).await {
                Ok(resp) if resp.is_success() => {
                    FetchMetrics::record_success();
                    debug!(status = resp.status, bytes = resp.body.len(), "Fetched page");
                    return Ok(FetchedPage {
                        url: url.to_string(),
                        html: resp.body,
                        fetched_at: Utc::now(),
                    });
                }
                Ok(resp) if resp.status == 429 => {
                    last_status = Some(429);
                    last_error = "HTTP 429 Too Many Requests".to_string();
                    if retries_left {
                        let wait = match resp.retry_after_secs {
                            Some(secs) => Duration::from_secs(secs),
                            None => self.retry_delay() * (attempt + 1),
                        };
                        warn!(attempt, wait_ms = wait.as_millis() as u64, "Rate limited, backing off");
                        FetchMetrics::record_retry();
                        tokio::time::sleep(wait).await;
                    }
                }
                Ok(resp) if is_transient(resp.status) => {
                    last_status = Some(resp.status);
                    last_error = format!("HTTP {}", resp.status);
                    if retries_left {
                        self.backoff(attempt, &last_error).await;
                    }
                }
                Ok(resp) => {
                    FetchMetrics::record_error("status");
                    return Err(ScoutError::fetch(
                        url,
                        format!("HTTP {}: {}", resp.status, truncate_chars(resp.body.trim(), 200)),
                        Some(resp.status),
                    ));
                }
                Err(e) => {
                    last_status = None;
                    last_error = e;
                    if retries_left {
                        self.backoff(attempt, &last_error).await;
                    }
                }
            }
        }

        FetchMetrics::record_error("exhausted");
        Err(ScoutError::fetch(
            url,
            format!("gave up after {} attempts: {}", max_attempts, last_error),
            last_status,
        ))
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.config.retry_delay_ms)
    }

    async fn backoff(&self, attempt: u32, reason: &str) {
        let wait = self.retry_delay() * 2u32.saturating_pow(attempt);
        warn!(attempt, wait_ms = wait.as_millis() as u64, reason, "Fetch failed, retrying");
        FetchMetrics::record_retry();
        tokio::time::sleep(wait).await;
    }

    /// Best-effort robots.txt check, not RFC 9309: the site is off limits only when
    /// robots.txt has a `Disallow: /` line. Unreachable or non-200 robots.txt means
    /// allowed. Results are cached per origin. The robots.txt request counts against
    /// the domain's rate limit like any page request.
    async fn robots_allowed(&self, url: &str, domain: &str) -> bool {
        let Some(origin) = Url::parse(url).ok().map(|u| u.origin().ascii_serialization()) else {
            return true;
        };

        if let Some(allowed) = self.robots_cache.lock().await.get(&origin) {
            return *allowed;
        }

        let robots_url = format!("{}/robots.txt", origin);
        self.limiter.acquire(domain).await;
        let allowed = match self.http.get(&robots_url).await {
            Ok(resp) if resp.status == 200 => !disallows_everything(&resp.body),
            Ok(resp) => {
                debug!(status = resp.status, "robots.txt not available, assuming allowed");
                true
            }
            Err(e) => {
                debug!(error = %e, "robots.txt unreachable, assuming allowed");
                true
            }
        };

        self.robots_cache.lock().await.insert(origin, allowed);
        allowed
    }
}

fn is_transient(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504)
}

/// True when any line is a blanket `Disallow: /`. User-agent groups are ignored.
pub fn disallows_everything(robots: &str) -> bool {
    robots.lines().any(|line| {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            return false;
        };
        key.trim().eq_ignore_ascii_case("disallow") && value.trim() == "/"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Serves robots.txt from a fixed body and pages from a scripted queue.
    struct ScriptedHttp {
        robots: Option<String>,
        pages: std::sync::Mutex<VecDeque<std::result::Result<HttpGetResult, String>>>,
        page_calls: std::sync::Mutex<Vec<Instant>>,
        robots_calls: std::sync::Mutex<Vec<Instant>>,
    }

    impl ScriptedHttp {
        fn new(robots: Option<&str>, pages: Vec<std::result::Result<HttpGetResult, String>>) -> Self {
            Self {
                robots: robots.map(|r| r.to_string()),
                pages: std::sync::Mutex::new(pages.into()),
                page_calls: std::sync::Mutex::new(Vec::new()),
                robots_calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn page_calls(&self) -> Vec<Instant> {
            self.page_calls.lock().unwrap().clone()
        }
    }

    fn response(status: u16, body: &str, retry_after_secs: Option<u64>) -> std::result::Result<HttpGetResult, String> {
        Ok(HttpGetResult {
            status,
            body: body.to_string(),
            content_type: "text/html".to_string(),
            retry_after_secs,
        })
    }

    #[async_trait]
    impl HttpClientPort for ScriptedHttp {
        async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, String> {
            if url.ends_with("/robots.txt") {
                self.robots_calls.lock().unwrap().push(Instant::now());
                return match &self.robots {
                    Some(body) => response(200, body, None),
                    None => response(404, "", None),
                };
            }
            self.page_calls.lock().unwrap().push(Instant::now());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted response".to_string()))
        }
    }

    fn fetcher(http: Arc<ScriptedHttp>) -> Fetcher {
        let config = FetchConfig {
            min_interval_ms: 0,
            retry_delay_ms: 1000,
            ..FetchConfig::default()
        };
        Fetcher::new(http, DomainRateLimiter::new(Duration::ZERO), config)
    }

    #[tokio::test(start_paused = true)]
    async fn returns_html_on_success() {
        let http = Arc::new(ScriptedHttp::new(None, vec![response(200, "<html>ok</html>", None)]));
        let page = fetcher(http).fetch("https://fest.de/").await.unwrap();
        assert_eq!(page.html, "<html>ok</html>");
        assert_eq!(page.url, "https://fest.de/");
    }

    #[tokio::test(start_paused = true)]
    async fn honours_retry_after_on_429() {
        let http = Arc::new(ScriptedHttp::new(
            None,
            vec![response(429, "slow down", Some(2)), response(200, "ok", None)],
        ));
        let page = fetcher(http.clone()).fetch("https://fest.de/").await.unwrap();
        assert_eq!(page.html, "ok");

        let calls = http.page_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1] - calls[0] >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn linear_wait_on_429_without_retry_after() {
        let http = Arc::new(ScriptedHttp::new(
            None,
            vec![response(429, "", None), response(429, "", None), response(200, "ok", None)],
        ));
        fetcher(http.clone()).fetch("https://fest.de/").await.unwrap();

        let calls = http.page_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= Duration::from_millis(1000));
        assert!(calls[2] - calls[1] >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_back_off_exponentially_then_give_up() {
        let http = Arc::new(ScriptedHttp::new(
            None,
            vec![
                Err("connection reset".to_string()),
                Err("connection reset".to_string()),
                Err("connection reset".to_string()),
            ],
        ));
        let err = fetcher(http.clone()).fetch("https://fest.de/").await.unwrap_err();
        assert!(matches!(err, ScoutError::Fetch { .. }));

        let calls = http.page_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= Duration::from_millis(1000));
        assert!(calls[2] - calls[1] >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let http = Arc::new(ScriptedHttp::new(
            None,
            vec![response(404, "Not Found", None), response(200, "never", None)],
        ));
        let err = fetcher(http.clone()).fetch("https://fest.de/missing").await.unwrap_err();
        match err {
            ScoutError::Fetch { status, message, .. } => {
                assert_eq!(status, Some(404));
                assert!(message.contains("Not Found"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(http.page_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn blanket_disallow_blocks_before_fetching() {
        let http = Arc::new(ScriptedHttp::new(
            Some("User-agent: *\nDisallow: /\n"),
            vec![response(200, "never", None)],
        ));
        let err = fetcher(http.clone()).fetch("https://fest.de/").await.unwrap_err();
        assert!(matches!(err, ScoutError::RobotsDisallowed { .. }));
        assert!(http.page_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn partial_disallow_is_allowed() {
        let http = Arc::new(ScriptedHttp::new(
            Some("User-agent: *\nDisallow: /admin/\n"),
            vec![response(200, "ok", None)],
        ));
        assert!(fetcher(http).fetch("https://fest.de/").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn robots_request_is_rate_limited_with_the_page() {
        let http = Arc::new(ScriptedHttp::new(
            Some("User-agent: *\nDisallow: /admin/\n"),
            vec![response(200, "ok", None)],
        ));
        let config = FetchConfig {
            min_interval_ms: 1000,
            ..FetchConfig::default()
        };
        let fetcher = Fetcher::new(http.clone(), DomainRateLimiter::new(Duration::from_millis(1000)), config);
        fetcher.fetch("https://fest.de/").await.unwrap();

        let robots = http.robots_calls.lock().unwrap().clone();
        let pages = http.page_calls();
        assert_eq!(robots.len(), 1);
        assert_eq!(pages.len(), 1);
        assert!(pages[0] - robots[0] >= Duration::from_millis(1000));
    }

    #[test]
    fn robots_parsing_is_line_based() {
        assert!(disallows_everything("User-agent: *\nDisallow: /"));
        assert!(disallows_everything("user-agent: *\n  disallow:   /   # everything"));
        assert!(!disallows_everything("Disallow: /private"));
        assert!(!disallows_everything("Disallow:"));
        assert!(!disallows_everything(""));
    }
}
