//! The long-lived dispatchers and the per-event workers they spawn.
//!
//! Each dispatcher drains one stage queue and hands every unit of work to a
//! fresh task; the entity pools throttle how many of those tasks make
//! progress at once. Panics inside a worker are contained and logged, never
//! propagated.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::analyzer::ParseResponse;
use crate::base::{Data, Request, Response};
use crate::errors::{
    generate_code, PoolError, ANALYZER_CODE, DOWNLOADER_CODE, ITEM_PIPELINE_CODE, SCHEDULER_CODE,
};
use crate::pool::Entity;

use super::core::RunContext;

/// Drains the request queue, one download task per request. Exits when the
/// queue closes.
pub(crate) fn spawn_download_dispatch(ctx: Arc<RunContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(req_rx) = ctx.chanman.req_receiver() else {
            return;
        };
        debug!("download dispatch started");
        while let Ok(req) = req_rx.recv().await {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { download_one(&ctx, req).await });
        }
        debug!("download dispatch finished");
    })
}

async fn download_one(ctx: &RunContext, req: Request) {
    let downloader = match ctx.downloader_pool.take() {
        Ok(downloader) => downloader,
        Err(err) => {
            // With no free downloader the request goes back to the backlog;
            // a later pump tick retries it once an entity is released.
            if err == PoolError::Empty {
                ctx.req_cache.put(req);
            }
            ctx.send_error(SCHEDULER_CODE, format!("downloader pool error: {err}"));
            return;
        }
    };
    let code = generate_code(DOWNLOADER_CODE, downloader.id());
    let outcome = AssertUnwindSafe(async {
        match downloader.download(req).await {
            Ok(resp) => {
                ctx.send_resp(resp, &code).await;
            }
            Err(err) => {
                ctx.send_error(&code, err.to_string());
            }
        }
    })
    .catch_unwind()
    .await;
    if let Err(panic) = outcome {
        error!("fatal download error: {}", panic_message(&panic));
    }
    if let Err(err) = ctx.downloader_pool.release(downloader) {
        ctx.send_error(SCHEDULER_CODE, format!("downloader pool error: {err}"));
    }
}

/// Drains the response queue, one analysis task per response. Exits when the
/// queue closes.
pub(crate) fn spawn_analyze_dispatch(
    ctx: Arc<RunContext>,
    parsers: Arc<Vec<Arc<ParseResponse>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(resp_rx) = ctx.chanman.resp_receiver() else {
            return;
        };
        debug!("analyze dispatch started");
        while let Ok(resp) = resp_rx.recv().await {
            let ctx = Arc::clone(&ctx);
            let parsers = Arc::clone(&parsers);
            tokio::spawn(async move { analyze_one(&ctx, &parsers, resp).await });
        }
        debug!("analyze dispatch finished");
    })
}

async fn analyze_one(ctx: &RunContext, parsers: &[Arc<ParseResponse>], resp: Response) {
    let analyzer = match ctx.analyzer_pool.take() {
        Ok(analyzer) => analyzer,
        Err(err) => {
            ctx.send_error(SCHEDULER_CODE, format!("analyzer pool error: {err}"));
            return;
        }
    };
    let code = generate_code(ANALYZER_CODE, analyzer.id());
    let outcome = AssertUnwindSafe(async {
        let (data_list, errors) = analyzer.analyze(parsers, &resp);
        for datum in data_list {
            match datum {
                Data::Request(req) => {
                    ctx.save_req_to_cache(req, &code);
                }
                Data::Item(item) => {
                    ctx.send_item(item, &code).await;
                }
            }
        }
        for err in errors {
            ctx.send_error(&code, err.to_string());
        }
    })
    .catch_unwind()
    .await;
    if let Err(panic) = outcome {
        error!("fatal analysis error: {}", panic_message(&panic));
    }
    if let Err(err) = ctx.analyzer_pool.release(analyzer) {
        ctx.send_error(SCHEDULER_CODE, format!("analyzer pool error: {err}"));
    }
}

/// Drains the item queue, one pipeline traversal per item. Exits when the
/// queue closes.
pub(crate) fn spawn_item_dispatch(ctx: Arc<RunContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(item_rx) = ctx.chanman.item_receiver() else {
            return;
        };
        debug!("item dispatch started");
        while let Ok(item) = item_rx.recv().await {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                match std::panic::catch_unwind(AssertUnwindSafe(|| ctx.pipeline.send(item))) {
                    Ok(errors) => {
                        for err in errors {
                            ctx.send_error(ITEM_PIPELINE_CODE, err.message().to_owned());
                        }
                    }
                    Err(panic) => {
                        error!("fatal item processing error: {}", panic_message(&panic));
                    }
                }
            });
        }
        debug!("item dispatch finished");
    })
}

/// Moves requests from the backlog to the request queue, up to the queue's
/// current slack, once per `interval`. Acknowledges the stop signal and
/// exits when it is set.
pub(crate) fn spawn_frontier_pump(ctx: Arc<RunContext>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(req_tx) = ctx.chanman.req_sender() else {
            return;
        };
        let req_cap = ctx.channel_args.req_len();
        debug!("frontier pump started");
        loop {
            let mut slack = req_cap.saturating_sub(req_tx.len());
            while slack > 0 {
                let Some(req) = ctx.req_cache.get() else {
                    break;
                };
                if req_tx.send(req).await.is_err() {
                    break;
                }
                slack -= 1;
            }
            tokio::time::sleep(interval).await;
            if ctx.stop_sign.signed() {
                ctx.stop_sign.deal(SCHEDULER_CODE);
                debug!("frontier pump acknowledged stop");
                return;
            }
        }
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
