//! Owner of the four typed stage queues.
//!
//! The manager linearizes the queue lifecycle: accessors fail until `init`
//! has run and again after `close`. Closing happens exactly once and closes
//! all four queues, which makes every blocked or future send/receive on them
//! fail fast.

use kanal::{bounded_async, AsyncReceiver, AsyncSender};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::args::ChannelArgs;
use crate::base::{Item, Request, Response};
use crate::errors::{ChannelError, ConfigError, CrawlerError};

/// Lifecycle state of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Uninitialized,
    Initialized,
    Closed,
}

/// Instantaneous queue occupancy, for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelLens {
    pub req: usize,
    pub resp: usize,
    pub item: usize,
    pub error: usize,
}

struct StageChannels {
    req_tx: AsyncSender<Request>,
    req_rx: AsyncReceiver<Request>,
    resp_tx: AsyncSender<Response>,
    resp_rx: AsyncReceiver<Response>,
    item_tx: AsyncSender<Item>,
    item_rx: AsyncReceiver<Item>,
    error_tx: AsyncSender<CrawlerError>,
    error_rx: AsyncReceiver<CrawlerError>,
}

struct Inner {
    status: ChannelStatus,
    args: ChannelArgs,
    channels: Option<StageChannels>,
}

pub struct ChannelManager {
    inner: RwLock<Inner>,
}

impl ChannelManager {
    /// A manager with no queues yet; every accessor fails with
    /// [`ChannelError::Uninitialized`] until [`init`](Self::init) runs.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                status: ChannelStatus::Uninitialized,
                args: ChannelArgs::new(0, 0, 0, 0),
                channels: None,
            }),
        }
    }

    /// Creates the four stage queues with the given capacities, replacing
    /// any previous set.
    pub fn init(&self, args: ChannelArgs) -> Result<(), ConfigError> {
        args.check()?;
        let (req_tx, req_rx) = bounded_async(args.req_len());
        let (resp_tx, resp_rx) = bounded_async(args.resp_len());
        let (item_tx, item_rx) = bounded_async(args.item_len());
        let (error_tx, error_rx) = bounded_async(args.error_len());
        let mut inner = self.inner.write();
        inner.args = args;
        inner.channels = Some(StageChannels {
            req_tx,
            req_rx,
            resp_tx,
            resp_rx,
            item_tx,
            item_rx,
            error_tx,
            error_rx,
        });
        inner.status = ChannelStatus::Initialized;
        Ok(())
    }

    /// Closes all four queues. Returns `false` if the manager was not in the
    /// initialized state, so a second close is a no-op.
    pub fn close(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.status != ChannelStatus::Initialized {
            return false;
        }
        if let Some(channels) = inner.channels.take() {
            let _ = channels.req_tx.close();
            let _ = channels.resp_tx.close();
            let _ = channels.item_tx.close();
            let _ = channels.error_tx.close();
        }
        inner.status = ChannelStatus::Closed;
        debug!("stage queues closed");
        true
    }

    pub fn status(&self) -> ChannelStatus {
        self.inner.read().status
    }

    pub fn args(&self) -> ChannelArgs {
        self.inner.read().args
    }

    pub fn req_sender(&self) -> Result<AsyncSender<Request>, ChannelError> {
        self.with_channels(|c| c.req_tx.clone())
    }

    pub fn req_receiver(&self) -> Result<AsyncReceiver<Request>, ChannelError> {
        self.with_channels(|c| c.req_rx.clone())
    }

    pub fn resp_sender(&self) -> Result<AsyncSender<Response>, ChannelError> {
        self.with_channels(|c| c.resp_tx.clone())
    }

    pub fn resp_receiver(&self) -> Result<AsyncReceiver<Response>, ChannelError> {
        self.with_channels(|c| c.resp_rx.clone())
    }

    pub fn item_sender(&self) -> Result<AsyncSender<Item>, ChannelError> {
        self.with_channels(|c| c.item_tx.clone())
    }

    pub fn item_receiver(&self) -> Result<AsyncReceiver<Item>, ChannelError> {
        self.with_channels(|c| c.item_rx.clone())
    }

    pub fn error_sender(&self) -> Result<AsyncSender<CrawlerError>, ChannelError> {
        self.with_channels(|c| c.error_tx.clone())
    }

    pub fn error_receiver(&self) -> Result<AsyncReceiver<CrawlerError>, ChannelError> {
        self.with_channels(|c| c.error_rx.clone())
    }

    /// Current length of each queue.
    pub fn lens(&self) -> Result<ChannelLens, ChannelError> {
        self.with_channels(|c| ChannelLens {
            req: c.req_tx.len(),
            resp: c.resp_tx.len(),
            item: c.item_tx.len(),
            error: c.error_tx.len(),
        })
    }

    fn with_channels<R>(&self, f: impl FnOnce(&StageChannels) -> R) -> Result<R, ChannelError> {
        let inner = self.inner.read();
        match inner.status {
            ChannelStatus::Uninitialized => Err(ChannelError::Uninitialized),
            ChannelStatus::Closed => Err(ChannelError::Closed),
            ChannelStatus::Initialized => {
                let channels = inner.channels.as_ref().ok_or(ChannelError::Closed)?;
                Ok(f(channels))
            }
        }
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
