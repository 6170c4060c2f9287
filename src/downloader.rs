//! Pooled downloader entity: one HTTP round-trip per call.

use log::info;

use crate::base::{Request, Response};
use crate::pool::Entity;

/// Factory for the HTTP clients that downloaders are built around. Injected
/// at start so the engine never owns transport policy (timeouts, proxies,
/// redirects all belong to the caller's client).
pub type GenHttpClient = dyn Fn() -> reqwest::Client + Send + Sync;

/// A reusable page downloader with a stable diagnostic id.
#[derive(Debug)]
pub struct Downloader {
    id: u32,
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(id: u32, client: reqwest::Client) -> Self {
        Self { id, client }
    }

    /// Performs the request and buffers the body. The response inherits the
    /// request's depth.
    pub async fn download(&self, req: Request) -> Result<Response, reqwest::Error> {
        let depth = req.depth();
        let http_req = req.into_http_req();
        info!("fetching {} (depth {depth})", http_req.url());

        let http_resp = self.client.execute(http_req).await?;
        let url = http_resp.url().clone();
        let status = http_resp.status();
        let headers = http_resp.headers().clone();
        let body = http_resp.bytes().await?;
        Ok(Response::new(url, status, headers, body, depth))
    }
}

impl Entity for Downloader {
    fn id(&self) -> u32 {
        self.id
    }
}
