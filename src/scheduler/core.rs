//! The scheduler: wires every component into a running crawl.
//!
//! `start` validates the configuration, builds the per-run context (queues,
//! pools, pipeline, cache, URL set), launches the long-lived dispatchers and
//! seeds the backlog. `stop` signs the stop signal and closes everything;
//! in-flight workers notice at their next send or admission and back out.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use kanal::AsyncReceiver;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::analyzer::{Analyzer, ParseResponse};
use crate::args::{ChannelArgs, PoolArgs};
use crate::base::{Item, Request, Response};
use crate::cache::RequestCache;
use crate::channels::ChannelManager;
use crate::downloader::Downloader;
use crate::errors::{CrawlerError, ErrorKind, StartError};
use crate::id::IdGenerator;
use crate::pipeline::{ItemPipeline, ProcessItem};
use crate::pool::Pool;
use crate::signal::StopSign;

use super::{dispatch, domain};

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Everything one crawl run owns. Rebuilt on every `start`, shared with the
/// dispatchers through an `Arc`.
pub(crate) struct RunContext {
    pub(crate) channel_args: ChannelArgs,
    pub(crate) pool_args: PoolArgs,
    pub(crate) crawl_depth: u32,
    pub(crate) primary_domain: String,
    pub(crate) chanman: ChannelManager,
    pub(crate) stop_sign: Arc<StopSign>,
    pub(crate) downloader_pool: Pool<Downloader>,
    pub(crate) analyzer_pool: Pool<Analyzer>,
    pub(crate) pipeline: ItemPipeline,
    pub(crate) req_cache: RequestCache,
    pub(crate) url_set: DashSet<String>,
}

impl RunContext {
    /// Forwards a response to the response queue. Backs out with a stop-sign
    /// acknowledgement when the signal is set.
    pub(crate) async fn send_resp(&self, resp: Response, code: &str) -> bool {
        if self.stop_sign.signed() {
            self.stop_sign.deal(code);
            return false;
        }
        let Ok(tx) = self.chanman.resp_sender() else {
            return false;
        };
        tx.send(resp).await.is_ok()
    }

    /// Forwards a scraped item to the item queue, with the same stop-sign
    /// check as [`send_resp`](Self::send_resp).
    pub(crate) async fn send_item(&self, item: Item, code: &str) -> bool {
        if self.stop_sign.signed() {
            self.stop_sign.deal(code);
            return false;
        }
        let Ok(tx) = self.chanman.item_sender() else {
            return false;
        };
        tx.send(item).await.is_ok()
    }

    /// Puts an error on the error queue from a detached task, so a slow or
    /// full error queue never wedges a worker. The error kind is derived
    /// from the component code's prefix.
    pub(crate) fn send_error(&self, code: &str, message: impl Into<String>) -> bool {
        let err = CrawlerError::new(ErrorKind::from_code(code), message);
        if self.stop_sign.signed() {
            self.stop_sign.deal(code);
            return false;
        }
        let Ok(tx) = self.chanman.error_sender() else {
            return false;
        };
        tokio::spawn(async move {
            // A closed queue fails the send immediately; nothing to do then.
            let _ = tx.send(err).await;
        });
        true
    }

    /// Admission control for requests discovered by analyzers: scheme,
    /// de-duplication, same-primary-domain and depth-bound checks, then the
    /// stop-sign gate, then the cache.
    pub(crate) fn save_req_to_cache(&self, req: Request, code: &str) -> bool {
        let url = req.url();
        if !url.scheme().eq_ignore_ascii_case("http") {
            warn!(
                "ignoring request {url}: scheme '{}' is not 'http'",
                url.scheme()
            );
            return false;
        }
        let url_str = url.as_str().to_owned();
        if self.url_set.contains(&url_str) {
            warn!("ignoring request {url_str}: URL already seen");
            return false;
        }
        let Some(host) = url.host_str() else {
            warn!("ignoring request {url_str}: URL has no host");
            return false;
        };
        match domain::primary_domain(host) {
            Some(pd) if pd == self.primary_domain => {}
            _ => {
                warn!(
                    "ignoring request {url_str}: host '{host}' is outside primary domain '{}'",
                    self.primary_domain
                );
                return false;
            }
        }
        if req.depth() > self.crawl_depth {
            warn!(
                "ignoring request {url_str}: depth {} exceeds the bound {}",
                req.depth(),
                self.crawl_depth
            );
            return false;
        }
        if self.stop_sign.signed() {
            self.stop_sign.deal(code);
            return false;
        }
        if !self.req_cache.put(req) {
            return false;
        }
        self.url_set.insert(url_str);
        true
    }
}

/// The crawler orchestration engine. Create once, `start` a run, observe it
/// through `running`/`idle`/`summary`/`error_receiver`, and `stop` it (or
/// let the monitor do so once the run goes idle).
pub struct Scheduler {
    running: AtomicU8,
    stop_sign: Arc<StopSign>,
    ctx: RwLock<Option<Arc<RunContext>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            running: AtomicU8::new(NOT_STARTED),
            stop_sign: Arc::new(StopSign::new()),
            ctx: RwLock::new(None),
        }
    }

    /// Launches a crawl from `seed`. Must be called within a Tokio runtime;
    /// the dispatchers are spawned onto it. Fails fast on invalid
    /// configuration or if a run is already active.
    pub fn start(
        &self,
        channel_args: ChannelArgs,
        pool_args: PoolArgs,
        crawl_depth: u32,
        http_client_gen: impl Fn() -> reqwest::Client,
        resp_parsers: Vec<Arc<ParseResponse>>,
        item_processors: Vec<Arc<ProcessItem>>,
        seed: reqwest::Request,
    ) -> Result<(), StartError> {
        self.running
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |state| {
                (state != RUNNING).then_some(RUNNING)
            })
            .map_err(|_| StartError::AlreadyStarted)?;

        let result = self.launch(
            channel_args,
            pool_args,
            crawl_depth,
            http_client_gen,
            resp_parsers,
            item_processors,
            seed,
        );
        if result.is_err() {
            self.running.store(NOT_STARTED, Ordering::SeqCst);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn launch(
        &self,
        channel_args: ChannelArgs,
        pool_args: PoolArgs,
        crawl_depth: u32,
        http_client_gen: impl Fn() -> reqwest::Client,
        resp_parsers: Vec<Arc<ParseResponse>>,
        item_processors: Vec<Arc<ProcessItem>>,
        seed: reqwest::Request,
    ) -> Result<(), StartError> {
        channel_args.check()?;
        pool_args.check()?;
        if item_processors.is_empty() {
            return Err(StartError::NoItemProcessors);
        }
        let host = seed
            .url()
            .host_str()
            .ok_or_else(|| StartError::InvalidSeed("the seed URL has no host".into()))?;
        let primary_domain = domain::primary_domain(host).ok_or_else(|| {
            StartError::InvalidSeed(format!("cannot derive a primary domain from host '{host}'"))
        })?;

        let chanman = ChannelManager::new();
        chanman.init(channel_args)?;

        let downloader_ids = IdGenerator::new();
        let downloader_pool = Pool::new(pool_args.downloader_pool_size(), || {
            Downloader::new(downloader_ids.next(), http_client_gen())
        })?;
        let analyzer_ids = IdGenerator::new();
        let analyzer_pool = Pool::new(pool_args.analyzer_pool_size(), || {
            Analyzer::new(analyzer_ids.next())
        })?;

        let pipeline = ItemPipeline::new(item_processors);
        pipeline.set_fail_fast(true);

        self.stop_sign.reset();

        let ctx = Arc::new(RunContext {
            channel_args,
            pool_args,
            crawl_depth,
            primary_domain: primary_domain.clone(),
            chanman,
            stop_sign: Arc::clone(&self.stop_sign),
            downloader_pool,
            analyzer_pool,
            pipeline,
            req_cache: RequestCache::new(),
            url_set: DashSet::new(),
        });
        *self.ctx.write() = Some(Arc::clone(&ctx));

        dispatch::spawn_download_dispatch(Arc::clone(&ctx));
        dispatch::spawn_analyze_dispatch(Arc::clone(&ctx), Arc::new(resp_parsers));
        dispatch::spawn_item_dispatch(Arc::clone(&ctx));
        dispatch::spawn_frontier_pump(Arc::clone(&ctx), Duration::from_millis(10));

        let seed_url = seed.url().as_str().to_owned();
        ctx.url_set.insert(seed_url);
        ctx.req_cache.put(Request::new(seed, 0));

        info!("scheduler started: primary domain '{primary_domain}', crawl depth {crawl_depth}");
        Ok(())
    }

    /// Signs the stop signal and closes the queues, the backlog and the
    /// pools. Returns `true` only for the call that performed the
    /// running-to-stopped transition.
    pub fn stop(&self) -> bool {
        if self
            .running
            .compare_exchange(RUNNING, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.stop_sign.sign();
        if let Some(ctx) = self.ctx.read().clone() {
            ctx.chanman.close();
            ctx.req_cache.close();
            ctx.downloader_pool.close();
            ctx.analyzer_pool.close();
        }
        info!("scheduler stopped");
        true
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst) == RUNNING
    }

    /// The error stream of the current run, or `None` when no run is
    /// active.
    pub fn error_receiver(&self) -> Option<AsyncReceiver<CrawlerError>> {
        if !self.running() {
            return None;
        }
        self.ctx
            .read()
            .as_ref()
            .and_then(|ctx| ctx.chanman.error_receiver().ok())
    }

    /// True when no downloader, analyzer or item processor is active. The
    /// backlog may still hold requests between pump ticks, so observers must
    /// debounce before treating an idle reading as "finished".
    pub fn idle(&self) -> bool {
        match self.ctx.read().as_ref() {
            Some(ctx) => {
                ctx.downloader_pool.used() == 0
                    && ctx.analyzer_pool.used() == 0
                    && ctx.pipeline.processing_number() == 0
            }
            None => true,
        }
    }

    pub fn summary(&self) -> super::SchedSummary {
        super::SchedSummary::collect(self.running(), self.ctx.read().as_deref())
    }

    /// Acknowledgement total of the current stop signal, for diagnostics.
    pub fn stop_deal_total(&self) -> u32 {
        self.stop_sign.deal_total()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
