//! Sequential fan-through of item processors.
//!
//! Each item is threaded through the processors in registration order, the
//! output of one becoming the input of the next. The in-flight counter feeds
//! the scheduler's idle predicate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;

use crate::base::Item;
use crate::errors::{CrawlerError, ErrorKind};

/// An item processor. Returns the (possibly transformed) item to hand to the
/// next processor, or `Ok(None)` / an error to report a processing failure.
pub type ProcessItem = dyn Fn(Item) -> anyhow::Result<Option<Item>> + Send + Sync;

pub struct ItemPipeline {
    processors: Vec<Arc<ProcessItem>>,
    fail_fast: AtomicBool,
    processing: AtomicUsize,
    processed: AtomicUsize,
}

impl ItemPipeline {
    pub fn new(processors: Vec<Arc<ProcessItem>>) -> Self {
        Self {
            processors,
            fail_fast: AtomicBool::new(false),
            processing: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
        }
    }

    /// Runs `item` through the processor chain and collects every error
    /// encountered. With fail-fast set, the first error ends the traversal;
    /// otherwise the chain continues with the last good value.
    pub fn send(&self, item: Item) -> Vec<CrawlerError> {
        self.processing.fetch_add(1, Ordering::SeqCst);
        // The in-flight count must come back down even if a processor
        // panics; a stuck count would hold the idle predicate false forever.
        let _in_flight = InFlightGuard(&self.processing);
        let fail_fast = self.fail_fast.load(Ordering::Acquire);
        let mut errors = Vec::new();
        let mut current = item;
        for processor in &self.processors {
            let fallback = if fail_fast {
                None
            } else {
                Some(current.clone())
            };
            match processor(current) {
                Ok(Some(next)) => current = next,
                Ok(None) => {
                    errors.push(CrawlerError::new(
                        ErrorKind::ItemProcessor,
                        "the processor returned an invalid result",
                    ));
                    break;
                }
                Err(err) => {
                    errors.push(CrawlerError::new(ErrorKind::ItemProcessor, err.to_string()));
                    match fallback {
                        Some(previous) => current = previous,
                        None => break,
                    }
                }
            }
        }
        if errors.is_empty() {
            self.processed.fetch_add(1, Ordering::SeqCst);
        } else {
            debug!("item finished the pipeline with {} error(s)", errors.len());
        }
        errors
    }

    pub fn set_fail_fast(&self, fail_fast: bool) {
        self.fail_fast.store(fail_fast, Ordering::Release);
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast.load(Ordering::Acquire)
    }

    /// Items currently inside `send`, across all concurrent callers.
    pub fn processing_number(&self) -> usize {
        self.processing.load(Ordering::SeqCst)
    }

    /// Items that traversed the whole chain without error.
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "processors: {}, fail fast: {}, processing: {}, processed: {}",
            self.processors.len(),
            self.fail_fast(),
            self.processing_number(),
            self.processed()
        )
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
