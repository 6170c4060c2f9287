//! Core data types that flow through the stage pipeline.
//!
//! A [`Request`] is an HTTP request paired with its crawl depth; downloading
//! it yields a [`Response`] that inherits the same depth. Parsers turn a
//! response into a heterogeneous list of [`Data`] values: follow-up requests
//! and scraped [`Item`]s.

use std::borrow::Cow;
use std::collections::HashMap;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

/// An HTTP request scheduled for download, tagged with its distance from the
/// seed. The seed itself has depth 0; a link discovered at depth `d` yields a
/// request at depth `d + 1`.
#[derive(Debug)]
pub struct Request {
    http_req: reqwest::Request,
    depth: u32,
}

impl Request {
    pub fn new(http_req: reqwest::Request, depth: u32) -> Self {
        Self { http_req, depth }
    }

    pub fn http_req(&self) -> &reqwest::Request {
        &self.http_req
    }

    pub fn into_http_req(self) -> reqwest::Request {
        self.http_req
    }

    pub fn url(&self) -> &Url {
        self.http_req.url()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
    }
}

/// A downloaded page: the interesting parts of the HTTP response, with the
/// body already read into memory, plus the depth of the request that
/// produced it.
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    depth: u32,
}

impl Response {
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: Bytes, depth: u32) -> Self {
        Self {
            url,
            status,
            headers,
            body,
            depth,
        }
    }

    /// Final URL of the response, after any redirects the client followed.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// A scraped record. Opaque to the engine; parsers fill it, item processors
/// transform it.
pub type Item = HashMap<String, serde_json::Value>;

/// What a parser may yield for one response: either a follow-up request or a
/// scraped item.
#[derive(Debug)]
pub enum Data {
    Request(Request),
    Item(Item),
}
