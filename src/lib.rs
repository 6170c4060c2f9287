//! # crawler-core
//!
//! A breadth-limited, depth-bounded web crawling engine. Given a seed HTTP
//! request, a maximum crawl depth and user-supplied response parsers and
//! item processors, the [`Scheduler`] fetches pages through a pool of
//! downloaders, extracts follow-up requests and data items through a pool of
//! analyzers, and drives the items through a processing pipeline, enforcing
//! a same-primary-domain policy, URL de-duplication and bounded queues at
//! every stage.
//!
//! The HTML parsing and the item sinks are pluggable functions; the HTTP
//! transport is injected as a client factory. The [`monitoring`] helper
//! observes a running scheduler and can stop it once the crawl goes idle.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use crawler_core::{
//!     monitoring, ChannelArgs, PoolArgs, Record, RecordLevel, Scheduler,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = Arc::new(Scheduler::new());
//!     let seed = reqwest::Request::new(
//!         reqwest::Method::GET,
//!         "http://example.com/".parse().unwrap(),
//!     );
//!     scheduler
//!         .start(
//!             ChannelArgs::default(),
//!             PoolArgs::default(),
//!             1,
//!             reqwest::Client::new,
//!             vec![Arc::new(|resp, depth| {
//!                 // extract links and items from `resp` here
//!                 (Vec::new(), Vec::new())
//!             })],
//!             vec![Arc::new(|item| Ok(Some(item)))],
//!             seed,
//!         )
//!         .unwrap();
//!
//!     let record: Record = Arc::new(|level, text| {
//!         if level == RecordLevel::Error {
//!             eprintln!("{text}");
//!         }
//!     });
//!     let checks = monitoring(
//!         Arc::clone(&scheduler),
//!         Duration::from_millis(1),
//!         1000,
//!         true,
//!         false,
//!         record,
//!     );
//!     checks.await.unwrap();
//! }
//! ```

pub mod analyzer;
pub mod args;
pub mod base;
pub mod cache;
pub mod channels;
pub mod downloader;
pub mod errors;
pub mod id;
pub mod monitor;
pub mod pipeline;
pub mod pool;
pub mod scheduler;
pub mod signal;

pub use analyzer::{Analyzer, ParseResponse};
pub use args::{ChannelArgs, PoolArgs};
pub use base::{Data, Item, Request, Response};
pub use cache::{CacheStatus, RequestCache};
pub use channels::{ChannelLens, ChannelManager, ChannelStatus};
pub use downloader::{Downloader, GenHttpClient};
pub use errors::{ChannelError, ConfigError, CrawlerError, ErrorKind, PoolError, StartError};
pub use id::IdGenerator;
pub use monitor::{monitoring, Record, RecordLevel};
pub use pipeline::{ItemPipeline, ProcessItem};
pub use pool::{Entity, Pool};
pub use scheduler::{primary_domain, SchedSummary, Scheduler};
pub use signal::StopSign;

pub use kanal;
pub use reqwest;
pub use url;
