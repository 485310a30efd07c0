//! HTTP transport, endpoints and the retrying fetch session
//!
//! The transport is the seam between the scheduler and the network: one
//! bounded-timeout GET per call, with the egress slot and client identity
//! passed in as per-request values. [`FetchSession`] wraps a transport with
//! the run's admission gate, pacing throttle and bounded retry/backoff, and
//! is shared by every page and detail task of a run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, REFERER, USER_AGENT,
};
use reqwest::{Client, ClientBuilder, Proxy};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::infrastructure::config::ScraperConfig;
use crate::infrastructure::error::{FetchError, ScrapeError};
use crate::infrastructure::rotation::Rotation;

const SEARCH_URL: &str = "https://search.jd.com/s_new.php";
const DETAIL_URL_BASE: &str = "https://item.jd.com";
const MOBILE_DETAIL_URL_BASE: &str = "https://item.m.jd.com";

/// Longest backoff between two attempts of the same request.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// One HTTP GET against the target site.
///
/// Implementations must be safe to call from many tasks at once. `egress`
/// selects an entry of the configured proxy pool (`None` = direct) and
/// `user_agent` is the identity header for this single request; neither is
/// stored between calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &Url,
        egress: Option<usize>,
        user_agent: &str,
    ) -> Result<String, FetchError>;
}

/// URL construction for the search and item-detail endpoints.
///
/// The query layout of the listing endpoint is part of the site's protocol:
/// `page` counts half-pages (`2n - 1`) and `s` is the 1-based item offset.
#[derive(Debug, Clone)]
pub struct Endpoints {
    search: Url,
    detail_base: Url,
    mobile_base: Url,
}

impl Endpoints {
    pub fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            search: parse_endpoint(SEARCH_URL)?,
            detail_base: parse_endpoint(DETAIL_URL_BASE)?,
            mobile_base: parse_endpoint(MOBILE_DETAIL_URL_BASE)?,
        })
    }

    /// Listing URL for 1-based `page_number`.
    pub fn search_page(&self, keyword: &str, page_number: u32, page_size: u32) -> Url {
        let page_param = 2 * u64::from(page_number) - 1;
        let offset_param = (u64::from(page_number) - 1) * u64::from(page_size) + 1;

        let mut url = self.search.clone();
        url.query_pairs_mut()
            .append_pair("keyword", keyword)
            .append_pair("enc", "utf-8")
            .append_pair("page", &page_param.to_string())
            .append_pair("s", &offset_param.to_string())
            .append_pair("scrolling", "y");
        url
    }

    /// Desktop detail URL for `sku`.
    pub fn detail_page(&self, sku: &str) -> Url {
        let mut url = self.detail_base.clone();
        url.set_path(&format!("/{sku}.html"));
        url
    }

    /// Mobile detail URL for `sku`.
    pub fn mobile_detail_page(&self, sku: &str) -> Url {
        let mut url = self.mobile_base.clone();
        url.set_path(&format!("/product/{sku}.html"));
        url
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ScrapeError> {
    Url::parse(raw).map_err(|e| ScrapeError::config(format!("endpoint '{raw}': {e}")))
}

/// Production transport backed by reqwest.
///
/// reqwest binds a proxy at client construction, so the pool is materialized
/// as one persistent client per egress address plus a direct client for the
/// empty-pool case. The rotation cursor indexes into that vector.
pub struct ReqwestTransport {
    direct: Client,
    proxied: Vec<Client>,
}

impl ReqwestTransport {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let direct = build_client(config, None)?;
        let proxied = config
            .proxy_pool
            .iter()
            .map(|address| build_client(config, Some(address)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { direct, proxied })
    }

    fn client_for(&self, egress: Option<usize>) -> &Client {
        match egress {
            Some(slot) => self.proxied.get(slot).unwrap_or(&self.direct),
            None => &self.direct,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        egress: Option<usize>,
        user_agent: &str,
    ) -> Result<String, FetchError> {
        let response = self
            .client_for(egress)
            .get(url.clone())
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| FetchError::from_request(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_request(url, &e))
    }
}

fn build_client(config: &ScraperConfig, proxy: Option<&str>) -> Result<Client, ScrapeError> {
    let mut builder = ClientBuilder::new()
        .timeout(config.request_timeout)
        .default_headers(fixed_headers())
        .cookie_store(true)
        .gzip(true)
        .brotli(true);

    if let Some(address) = proxy {
        let proxy = Proxy::all(address)
            .map_err(|e| ScrapeError::config(format!("proxy '{address}': {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ScrapeError::config(format!("http client: {e}")))
}

/// Headers sent on every request; the user-agent is added per request.
fn fixed_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(REFERER, HeaderValue::from_static("https://search.jd.com/"));
    headers
}

/// Retrying fetch layer shared by all tasks of one run.
///
/// The admission gate permit is held for the pacing throttle and the
/// transfer itself; backoff sleeps between attempts happen outside the
/// permit so a waiting retry does not starve other tasks.
pub struct FetchSession {
    config: Arc<ScraperConfig>,
    transport: Arc<dyn Transport>,
    rotation: Rotation,
    gate: Semaphore,
}

impl FetchSession {
    pub fn new(config: Arc<ScraperConfig>, transport: Arc<dyn Transport>) -> Self {
        let gate = Semaphore::new(config.max_tasks);
        let rotation = Rotation::new(config.proxy_pool.len());
        Self {
            config,
            transport,
            rotation,
            gate,
        }
    }

    /// Fetch `url`, retrying on transport failure up to the configured
    /// attempt budget. Exhaustion is reported to the owning task; it is that
    /// task's call whether to drop one page or item.
    pub async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
        let attempts = self.config.max_retry_attempts;
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = retry_delay(attempt);
                debug!(%url, attempt, ?delay, "backing off before retry");
                sleep(delay).await;
            }

            let egress = self.rotation.next_egress();
            let user_agent = self.rotation.random_user_agent();

            let outcome = match self.gate.acquire().await {
                Ok(_permit) => {
                    if attempt == 1 {
                        sleep(throttle_delay(self.config.base_delay, self.config.jitter)).await;
                    }
                    self.transport.get(url, egress, user_agent).await
                }
                Err(_) => Err(FetchError::Connection {
                    url: url.to_string(),
                    reason: "admission gate closed".to_string(),
                }),
            };

            match outcome {
                Ok(body) => {
                    debug!(%url, attempt, "fetched");
                    return Ok(body);
                }
                Err(err) => {
                    warn!(%url, attempt, max_attempts = attempts, error = %err, "request failed");
                    last_error = Some(err);
                }
            }
        }

        Err(ScrapeError::Exhausted {
            url: url.to_string(),
            attempts,
            source: last_error.unwrap_or_else(|| FetchError::Connection {
                url: url.to_string(),
                reason: "no attempt was made".to_string(),
            }),
        })
    }
}

/// Pacing delay before the first attempt: `base ± jitter`, floored at zero.
fn throttle_delay(base: Duration, jitter: Duration) -> Duration {
    let noise = (fastrand::f64() * 2.0 - 1.0) * jitter.as_secs_f64();
    let seconds = (base.as_secs_f64() + noise).max(0.0);
    Duration::from_secs_f64(seconds)
}

/// Backoff before attempt `n >= 2`: `min(30s, 2^n s + uniform(0,1) s)`.
fn retry_delay(attempt: u32) -> Duration {
    let seconds = (2f64.powi(attempt as i32) + fastrand::f64()).min(MAX_BACKOFF.as_secs_f64());
    Duration::from_secs_f64(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;

    struct FailingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FailingTransport {
        async fn get(
            &self,
            url: &Url,
            _egress: Option<usize>,
            _user_agent: &str,
        ) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    struct GateProbe {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Transport for GateProbe {
        async fn get(
            &self,
            _url: &Url,
            _egress: Option<usize>,
            _user_agent: &str,
        ) -> Result<String, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(String::new())
        }
    }

    fn quiet_config(keyword: &str) -> ScraperConfig {
        ScraperConfig::new(keyword)
            .with_base_delay(Duration::ZERO)
            .with_jitter(Duration::ZERO)
    }

    #[test]
    fn search_page_query_layout() {
        let endpoints = Endpoints::new().unwrap();
        let url = endpoints.search_page("冰箱", 3, 30);
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("keyword".to_string(), "冰箱".to_string()),
                ("enc".to_string(), "utf-8".to_string()),
                ("page".to_string(), "5".to_string()),
                ("s".to_string(), "61".to_string()),
                ("scrolling".to_string(), "y".to_string()),
            ]
        );
    }

    #[test]
    fn detail_urls_follow_the_templates() {
        let endpoints = Endpoints::new().unwrap();
        assert_eq!(
            endpoints.detail_page("100012345").as_str(),
            "https://item.jd.com/100012345.html"
        );
        assert_eq!(
            endpoints.mobile_detail_page("100012345").as_str(),
            "https://item.m.jd.com/product/100012345.html"
        );
    }

    proptest! {
        #[test]
        fn pagination_parameters_hold_for_any_page(page in 1u32..=50_000, size in 1u32..=200) {
            let endpoints = Endpoints::new().unwrap();
            let url = endpoints.search_page("tv", page, size);
            let lookup = |key: &str| {
                url.query_pairs()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.into_owned())
                    .unwrap()
            };
            prop_assert_eq!(lookup("page"), (2 * u64::from(page) - 1).to_string());
            prop_assert_eq!(
                lookup("s"),
                ((u64::from(page) - 1) * u64::from(size) + 1).to_string()
            );
        }

        #[test]
        fn backoff_stays_in_the_expected_window(attempt in 2u32..=8) {
            let delay = retry_delay(attempt).as_secs_f64();
            let floor = 2f64.powi(attempt as i32);
            if floor + 1.0 <= 30.0 {
                prop_assert!(delay >= floor && delay < floor + 1.0);
            } else {
                prop_assert!((delay - 30.0).abs() < f64::EPSILON || delay < floor + 1.0);
                prop_assert!(delay <= 30.0);
            }
        }

        #[test]
        fn throttle_is_floored_at_zero(base_ms in 0u64..=2_000, jitter_ms in 0u64..=2_000) {
            let delay = throttle_delay(
                Duration::from_millis(base_ms),
                Duration::from_millis(jitter_ms),
            );
            let base = base_ms as f64 / 1000.0;
            let jitter = jitter_ms as f64 / 1000.0;
            prop_assert!(delay.as_secs_f64() >= 0.0);
            prop_assert!(delay.as_secs_f64() <= base + jitter + 1e-9);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_carries_url_and_attempt_count() {
        let config = Arc::new(quiet_config("tv").with_max_retry_attempts(2));
        let transport = Arc::new(FailingTransport {
            calls: AtomicUsize::new(0),
        });
        let session = FetchSession::new(config, Arc::clone(&transport) as Arc<dyn Transport>);

        let url = Url::parse("https://item.jd.com/1.html").unwrap();
        let err = session.fetch(&url).await.unwrap_err();

        match err {
            ScrapeError::Exhausted { url, attempts, .. } => {
                assert_eq!(url, "https://item.jd.com/1.html");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_bounds_concurrent_transfers() {
        let max_tasks = 3;
        let config = Arc::new(quiet_config("tv").with_max_tasks(max_tasks));
        let probe = Arc::new(GateProbe {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let session = Arc::new(FetchSession::new(
            config,
            Arc::clone(&probe) as Arc<dyn Transport>,
        ));

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    let url = Url::parse(&format!("https://item.jd.com/{i}.html")).unwrap();
                    session.fetch(&url).await
                })
            })
            .collect();

        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }

        assert!(probe.max_in_flight.load(Ordering::SeqCst) <= max_tasks);
        // With twelve requests over three permits the gate must have been
        // saturated at least once.
        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), max_tasks);
    }
}
