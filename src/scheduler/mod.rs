//! # Scheduler Module
//!
//! The orchestration core: owns the stage queues, the entity pools, the
//! request backlog and the URL set, and drives data through the
//! requests-to-responses-to-items pipeline.
//!
//! ## Architecture
//!
//! `start` launches four long-lived tasks: the download dispatcher, the
//! analyze dispatcher, the item dispatcher and the frontier pump. Each
//! dispatcher spawns a short-lived task per unit of work; the pools bound
//! how many of those can hold an entity at once. Errors are fanned in on a
//! dedicated queue that the monitor drains. Shutdown is cooperative: one
//! stop signal, observed at every send and admission point.

mod core;
mod dispatch;
mod domain;
mod summary;

pub use self::core::Scheduler;
pub use domain::primary_domain;
pub use summary::SchedSummary;
