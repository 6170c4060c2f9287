//! Error types and component codes for the crawling engine.
//!
//! Every error that travels over the error queue is a [`CrawlerError`]: a
//! component kind plus a human-readable message. Errors that are returned
//! synchronously (start-time validation, pool and channel misuse) get their
//! own enums so callers can match on them.

use thiserror::Error;

/// Component code of the downloader stage.
pub const DOWNLOADER_CODE: &str = "downloader";
/// Component code of the analyzer stage.
pub const ANALYZER_CODE: &str = "analyzer";
/// Component code of the item pipeline stage.
pub const ITEM_PIPELINE_CODE: &str = "item_pipeline";
/// Component code of the scheduler itself.
pub const SCHEDULER_CODE: &str = "scheduler";

/// Builds a diagnostic code of the form `<component>_<id>` for a pooled
/// entity, e.g. `downloader_3`.
pub fn generate_code(component: &str, id: u32) -> String {
    format!("{component}_{id}")
}

/// Which stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    Downloader,
    Analyzer,
    ItemProcessor,
    Scheduler,
}

impl ErrorKind {
    /// Maps a component code (with or without an `_<id>` suffix) back to the
    /// kind of error its failures should carry.
    pub fn from_code(code: &str) -> Self {
        let prefix = match code.rsplit_once('_') {
            Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
                head
            }
            _ => code,
        };
        match prefix {
            DOWNLOADER_CODE => ErrorKind::Downloader,
            ANALYZER_CODE => ErrorKind::Analyzer,
            ITEM_PIPELINE_CODE => ErrorKind::ItemProcessor,
            _ => ErrorKind::Scheduler,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Downloader => "downloader error",
            ErrorKind::Analyzer => "analyzer error",
            ErrorKind::ItemProcessor => "item processor error",
            ErrorKind::Scheduler => "scheduler error",
        };
        f.write_str(name)
    }
}

/// An error observed by one of the crawling stages, as delivered on the
/// scheduler's error queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CrawlerError {
    kind: ErrorKind,
    message: String,
}

impl CrawlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("channel capacity `{0}` must be at least 1")]
    ZeroChannelCapacity(&'static str),
    #[error("pool size `{0}` must be at least 1")]
    ZeroPoolSize(&'static str),
}

/// Failures of the entity pool's take/release contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("the pool capacity must be at least 1")]
    ZeroCapacity,
    #[error("no free entity in the pool")]
    Empty,
    #[error("the pool is already at capacity")]
    Full,
    #[error("the pool is closed")]
    Closed,
}

/// Lifecycle violations of the channel manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("the channel manager has not been initialized")]
    Uninitialized,
    #[error("the channel manager is closed")]
    Closed,
}

/// Why `Scheduler::start` refused to launch a crawl.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("the scheduler has already been started")]
    AlreadyStarted,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("the item processor list is empty")]
    NoItemProcessors,
    #[error("the seed request is invalid: {0}")]
    InvalidSeed(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}
