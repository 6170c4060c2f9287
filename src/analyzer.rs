//! Pooled analyzer entity: runs the user-supplied parsers over one response.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::debug;

use crate::base::{Data, Response};
use crate::pool::Entity;

/// A response parser. Receives the downloaded page and its depth, and yields
/// follow-up requests and scraped items, plus any parse errors.
pub type ParseResponse =
    dyn Fn(&Response, u32) -> (Vec<Data>, Vec<anyhow::Error>) + Send + Sync;

/// A reusable analyzer with a stable diagnostic id.
#[derive(Debug)]
pub struct Analyzer {
    id: u32,
}

impl Analyzer {
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    /// Runs every parser in order against `resp`, concatenating their
    /// output. Requests discovered here are rewritten to depth
    /// `resp.depth() + 1` before they leave the analyzer, so a parser cannot
    /// smuggle a request past the depth bound by under-reporting it.
    pub fn analyze(
        &self,
        parsers: &[Arc<ParseResponse>],
        resp: &Response,
    ) -> (Vec<Data>, Vec<anyhow::Error>) {
        if parsers.is_empty() {
            return (Vec::new(), vec![anyhow!("the response parser list is empty")]);
        }

        debug!(url = %resp.url(), depth = resp.depth(), "analyzing response");

        let resp_depth = resp.depth();
        let mut data_list = Vec::new();
        let mut error_list = Vec::new();
        for parser in parsers {
            let (parsed, errors) = parser(resp, resp_depth);
            for datum in parsed {
                data_list.push(rewrite_depth(datum, resp_depth));
            }
            error_list.extend(errors);
        }
        (data_list, error_list)
    }
}

fn rewrite_depth(datum: Data, resp_depth: u32) -> Data {
    match datum {
        Data::Request(mut req) => {
            let derived = resp_depth.saturating_add(1);
            if req.depth() != derived {
                req.set_depth(derived);
            }
            Data::Request(req)
        }
        item @ Data::Item(_) => item,
    }
}

impl Entity for Analyzer {
    fn id(&self) -> u32 {
        self.id
    }
}
