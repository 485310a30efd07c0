//! Scrape-run scheduler and completion-ordered product stream
//!
//! One run spawns a task per listing page up front; each page task spawns a
//! task per discovered SKU as soon as its listing resolves, so detail work
//! from early pages interleaves with later listing fetches. Every task
//! competes for the same admission gate inside the fetch session, which is
//! the single point of backpressure. Results are yielded in completion
//! order; a failing task is logged and excluded without touching its
//! siblings.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::domain::product::Product;
use crate::infrastructure::config::{defaults, ScraperConfig};
use crate::infrastructure::error::ScrapeError;
use crate::infrastructure::http::{Endpoints, FetchSession, ReqwestTransport, Transport};
use crate::infrastructure::parsing::PageParsers;

/// Lifecycle of one scrape run.
///
/// `Draining` starts once the last page task has spawned its detail tasks
/// (nothing left to schedule); `Done` once every in-flight task settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunPhase {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Done = 3,
}

impl RunPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Done,
        }
    }
}

/// Completion-ordered stream of resolved products.
///
/// The stream ends when every spawned task has settled. Dropping it early
/// does not cancel the run: already-spawned tasks run to completion and
/// their results are discarded.
pub struct ProductStream {
    inner: ReceiverStream<Product>,
    phase: Arc<AtomicU8>,
}

impl ProductStream {
    /// Current lifecycle phase of the producing run.
    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Drain the stream into a vector, in completion order.
    pub async fn collect_all(mut self) -> Vec<Product> {
        let mut products = Vec::new();
        while let Some(product) = self.next().await {
            products.push(product);
        }
        products
    }
}

impl Stream for ProductStream {
    type Item = Product;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

/// Everything a spawned task needs, cheap to clone across the run.
#[derive(Clone)]
struct RunContext {
    config: Arc<ScraperConfig>,
    session: Arc<FetchSession>,
    endpoints: Arc<Endpoints>,
    parsers: Arc<PageParsers>,
}

/// One configured scrape run.
///
/// Consumed by [`Scraper::scrape`]; build a new scraper for a fresh run so
/// every run starts with fresh rotation state.
pub struct Scraper {
    context: RunContext,
}

impl Scraper {
    /// Build a scraper with the production HTTP transport.
    pub fn new(config: ScraperConfig) -> Result<Self, ScrapeError> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Build a scraper over a caller-supplied transport.
    pub fn with_transport(
        config: ScraperConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ScrapeError> {
        config.validate()?;
        let config = Arc::new(config);
        let session = Arc::new(FetchSession::new(Arc::clone(&config), transport));
        Ok(Self {
            context: RunContext {
                config,
                session,
                endpoints: Arc::new(Endpoints::new()?),
                parsers: Arc::new(PageParsers::new()?),
            },
        })
    }

    /// Default-configured scraper for `keyword`, mirroring the common case.
    pub fn from_keyword(keyword: &str, max_pages: u32) -> Result<Self, ScrapeError> {
        Self::new(ScraperConfig::new(keyword).with_max_pages(max_pages))
    }

    /// Start the run and return its product stream.
    ///
    /// Must be called from within a tokio runtime. The run terminates after
    /// all spawned tasks settle; there is no mid-run cancellation.
    pub fn scrape(self) -> ProductStream {
        let context = self.context;
        let (tx, rx) = mpsc::channel(defaults::RESULT_BUFFER);
        let phase = Arc::new(AtomicU8::new(RunPhase::Idle as u8));
        let pages_pending = Arc::new(AtomicUsize::new(context.config.max_pages as usize));

        phase.store(RunPhase::Running as u8, Ordering::Release);
        info!(
            keyword = %context.config.keyword,
            pages = context.config.max_pages,
            max_tasks = context.config.max_tasks,
            "scrape run started"
        );

        let mut page_handles = Vec::with_capacity(context.config.max_pages as usize);
        for page_number in 1..=context.config.max_pages {
            page_handles.push(tokio::spawn(context.clone().run_page(
                page_number,
                tx.clone(),
                Arc::clone(&phase),
                Arc::clone(&pages_pending),
            )));
        }

        let run_phase = Arc::clone(&phase);
        tokio::spawn(async move {
            for joined in join_all(page_handles).await {
                if let Err(err) = joined {
                    warn!(error = %err, "listing task aborted");
                }
            }
            run_phase.store(RunPhase::Done as u8, Ordering::Release);
            info!("scrape run complete");
            drop(tx);
        });

        ProductStream {
            inner: ReceiverStream::new(rx),
            phase,
        }
    }
}

impl RunContext {
    /// Fetch one listing page and fan out a detail task per discovered SKU.
    async fn run_page(
        self,
        page_number: u32,
        tx: mpsc::Sender<Product>,
        phase: Arc<AtomicU8>,
        pages_pending: Arc<AtomicUsize>,
    ) {
        let url = self
            .endpoints
            .search_page(&self.config.keyword, page_number, self.config.page_size);

        let skus = match self.session.fetch(&url).await {
            Ok(body) => self.parsers.listing.parse(&body),
            Err(err) => {
                warn!(page = page_number, error = %err, "listing page dropped");
                Vec::new()
            }
        };
        debug!(page = page_number, items = skus.len(), "listing parsed");

        let mut detail_handles = Vec::with_capacity(skus.len());
        for sku in skus {
            let context = self.clone();
            let tx = tx.clone();
            detail_handles.push(tokio::spawn(async move {
                if let Some(product) = context.resolve_detail(&sku).await {
                    if tx.send(product).await.is_err() {
                        debug!(%sku, "consumer gone, result dropped");
                    }
                }
            }));
        }

        // Last page task to finish spawning flips the run into draining.
        if pages_pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            phase.store(RunPhase::Draining as u8, Ordering::Release);
            debug!("all tasks spawned, draining");
        }

        for joined in join_all(detail_handles).await {
            if let Err(err) = joined {
                warn!(page = page_number, error = %err, "detail task aborted");
            }
        }
    }

    /// Resolve one SKU into a product, falling back to the mobile page when
    /// the desktop page does not expose a model. A SKU whose fetches fail is
    /// dropped; the run is unaffected.
    async fn resolve_detail(&self, sku: &str) -> Option<Product> {
        let url = self.endpoints.detail_page(sku);
        let body = match self.session.fetch(&url).await {
            Ok(body) => body,
            Err(err) => {
                warn!(%sku, error = %err, "item dropped after exhausted retries");
                return None;
            }
        };

        let fields = self.parsers.detail.parse(&body);
        let mut product = Product {
            sku: sku.to_string(),
            title: fields.title.unwrap_or_else(|| sku.to_string()),
            detail_url: url.to_string(),
            brand: fields.brand,
            model: fields.model,
            shop: fields.shop,
        };

        if product.model.is_none() {
            let mobile_url = self.endpoints.mobile_detail_page(sku);
            let mobile_body = match self.session.fetch(&mobile_url).await {
                Ok(body) => body,
                Err(err) => {
                    warn!(%sku, error = %err, "mobile fallback failed, item dropped");
                    return None;
                }
            };
            let mobile = self.parsers.mobile.parse(&mobile_body);
            // Brand prefers the desktop value; model always adopts the
            // mobile value once the fallback is taken, even when absent.
            product.brand = product.brand.or(mobile.brand);
            product.model = mobile.model;
        }

        Some(product)
    }
}
