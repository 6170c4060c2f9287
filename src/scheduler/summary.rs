//! Structural snapshot of a running scheduler.
//!
//! The monitor samples summaries and re-records only when something changed,
//! so the snapshot implements plain structural equality.

use serde::Serialize;

use crate::args::{ChannelArgs, PoolArgs};
use crate::channels::ChannelLens;

use super::core::RunContext;

/// One observation of the scheduler's externally visible state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedSummary {
    running: bool,
    crawl_depth: u32,
    primary_domain: String,
    channel_args: ChannelArgs,
    pool_args: PoolArgs,
    channel_lens: ChannelLens,
    downloaders_used: u32,
    analyzers_used: u32,
    processors: usize,
    processing_number: usize,
    items_processed: usize,
    url_count: usize,
    cache: String,
    stop_sign: String,
}

impl SchedSummary {
    pub(crate) fn collect(running: bool, ctx: Option<&RunContext>) -> Self {
        match ctx {
            Some(ctx) => Self {
                running,
                crawl_depth: ctx.crawl_depth,
                primary_domain: ctx.primary_domain.clone(),
                channel_args: ctx.channel_args,
                pool_args: ctx.pool_args,
                channel_lens: ctx.chanman.lens().unwrap_or_default(),
                downloaders_used: ctx.downloader_pool.used(),
                analyzers_used: ctx.analyzer_pool.used(),
                processors: ctx.pipeline.processor_count(),
                processing_number: ctx.pipeline.processing_number(),
                items_processed: ctx.pipeline.processed(),
                url_count: ctx.url_set.len(),
                cache: ctx.req_cache.summary(),
                stop_sign: ctx.stop_sign.summary(),
            },
            None => Self {
                running,
                crawl_depth: 0,
                primary_domain: String::new(),
                channel_args: ChannelArgs::new(0, 0, 0, 0),
                pool_args: PoolArgs::new(0, 0),
                channel_lens: ChannelLens::default(),
                downloaders_used: 0,
                analyzers_used: 0,
                processors: 0,
                processing_number: 0,
                items_processed: 0,
                url_count: 0,
                cache: String::new(),
                stop_sign: String::new(),
            },
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn url_count(&self) -> usize {
        self.url_count
    }

    pub fn items_processed(&self) -> usize {
        self.items_processed
    }

    /// Multi-line long form, one aspect per line.
    pub fn detail(&self) -> String {
        format!(
            "running: {}\n\
             crawl depth: {}\n\
             primary domain: {}\n\
             channel args: {}\n\
             pool args: {}\n\
             channel lens: req {} / resp {} / item {} / error {}\n\
             downloaders used: {}\n\
             analyzers used: {}\n\
             item processors: {}\n\
             items in flight: {}\n\
             items processed: {}\n\
             urls seen: {}\n\
             request cache: {}\n\
             stop sign: {}",
            self.running,
            self.crawl_depth,
            self.primary_domain,
            self.channel_args,
            self.pool_args,
            self.channel_lens.req,
            self.channel_lens.resp,
            self.channel_lens.item,
            self.channel_lens.error,
            self.downloaders_used,
            self.analyzers_used,
            self.processors,
            self.processing_number,
            self.items_processed,
            self.url_count,
            self.cache,
            self.stop_sign,
        )
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Display for SchedSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "running: {}, domain: {}, pools used: dl {} / an {}, in flight: {}, urls: {}, {}",
            self.running,
            self.primary_domain,
            self.downloaders_used,
            self.analyzers_used,
            self.processing_number,
            self.url_count,
            self.cache,
        )
    }
}
