//! End-to-end crawl scenarios against a loopback HTTP fixture.
//!
//! Each test runs a real scheduler plus monitor against a tiny TCP server
//! that serves canned HTML pages, and lets the idle watcher stop the crawl.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crawler_core::{
    monitoring, ChannelArgs, Data, Item, ParseResponse, PoolArgs, ProcessItem, Record,
    RecordLevel, Request, Response, Scheduler,
};

type Hits = Arc<Mutex<Vec<String>>>;

fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Serves the given path-to-HTML map over a fresh loopback listener,
/// recording every requested path. An optional delay before each response
/// simulates a slow origin.
async fn serve(pages: HashMap<String, String>, delay: Option<Duration>) -> (url::Url, Hits) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits: Hits = Arc::default();
    let pages = Arc::new(pages);
    {
        let hits = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(handle_conn(
                    stream,
                    Arc::clone(&pages),
                    Arc::clone(&hits),
                    delay,
                ));
            }
        });
    }
    (url::Url::parse(&format!("http://{addr}/")).unwrap(), hits)
}

async fn handle_conn(
    mut stream: TcpStream,
    pages: Arc<HashMap<String, String>>,
    hits: Hits,
    delay: Option<Duration>,
) {
    let mut buf = vec![0u8; 8192];
    let mut read = 0usize;
    loop {
        match stream.read(&mut buf[read..]).await {
            Ok(0) => break,
            Ok(n) => {
                read += n;
                if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
                if read == buf.len() {
                    break;
                }
            }
            Err(_) => return,
        }
    }
    let head = String::from_utf8_lossy(&buf[..read]);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    hits.lock().unwrap().push(path.clone());
    let body = pages
        .get(&path)
        .cloned()
        .unwrap_or_else(|| "<html></html>".to_string());
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn page(links: &[&str], with_item: bool) -> String {
    let mut body = String::from("<html><body>");
    for link in links {
        body.push_str(&format!("<a href=\"{link}\">link</a>"));
    }
    if with_item {
        body.push_str("<p data-kind=\"item\">payload</p>");
    }
    body.push_str("</body></html>");
    body
}

/// Extracts every `href` as a follow-up request and emits one item for pages
/// carrying the item marker.
fn link_and_item_parser() -> Arc<ParseResponse> {
    Arc::new(|resp: &Response, depth: u32| {
        let text = resp.text().into_owned();
        let mut data = Vec::new();
        let mut rest = text.as_str();
        while let Some(at) = rest.find("href=\"") {
            rest = &rest[at + 6..];
            let Some(end) = rest.find('"') else {
                break;
            };
            let href = &rest[..end];
            rest = &rest[end..];
            if let Ok(target) = resp.url().join(href) {
                data.push(Data::Request(Request::new(
                    reqwest::Request::new(reqwest::Method::GET, target),
                    depth + 1,
                )));
            }
        }
        if text.contains("data-kind=\"item\"") {
            let mut item = Item::new();
            item.insert("url".to_string(), serde_json::json!(resp.url().as_str()));
            data.push(Data::Item(item));
        }
        (data, Vec::new())
    })
}

fn counting_processor(counter: Arc<AtomicUsize>) -> Arc<ProcessItem> {
    Arc::new(move |item: Item| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Some(item))
    })
}

#[derive(Clone, Default)]
struct RecordSink {
    entries: Arc<Mutex<Vec<(RecordLevel, String)>>>,
}

impl RecordSink {
    fn record(&self) -> Record {
        let entries = Arc::clone(&self.entries);
        Arc::new(move |level, text: &str| {
            entries.lock().unwrap().push((level, text.to_string()));
        })
    }

    fn errors(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == RecordLevel::Error)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

fn start_crawl(
    scheduler: &Scheduler,
    seed: &url::Url,
    crawl_depth: u32,
    channel_args: ChannelArgs,
    pool_args: PoolArgs,
    items: Arc<AtomicUsize>,
) {
    scheduler
        .start(
            channel_args,
            pool_args,
            crawl_depth,
            reqwest::Client::new,
            vec![link_and_item_parser()],
            vec![counting_processor(items)],
            reqwest::Request::new(reqwest::Method::GET, seed.clone()),
        )
        .unwrap();
}

/// Runs the monitor with auto-stop and waits for the crawl to finish.
async fn watch_until_stopped(scheduler: &Arc<Scheduler>, sink: &RecordSink) -> u64 {
    let checks = monitoring(
        Arc::clone(scheduler),
        Duration::from_millis(1),
        1000,
        true,
        false,
        sink.record(),
    );
    tokio::time::timeout(Duration::from_secs(30), checks)
        .await
        .expect("the crawl did not go idle in time")
        .expect("the idle watcher dropped its check-count channel")
}

fn unique_paths(hits: &Hits) -> HashSet<String> {
    hits.lock().unwrap().iter().cloned().collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn single_page_crawl_stops_on_idle() {
    init_logging();
    let mut pages = HashMap::new();
    pages.insert("/".to_string(), page(&[], true));
    let (seed, hits) = serve(pages, None).await;

    let scheduler = Arc::new(Scheduler::new());
    let items = Arc::new(AtomicUsize::new(0));
    start_crawl(
        &scheduler,
        &seed,
        0,
        ChannelArgs::new(10, 10, 10, 10),
        PoolArgs::new(2, 2),
        Arc::clone(&items),
    );

    let sink = RecordSink::default();
    let checks = watch_until_stopped(&scheduler, &sink).await;

    assert!(checks > 0);
    assert!(!scheduler.running());
    assert_eq!(hits.lock().unwrap().len(), 1);
    assert_eq!(items.load(Ordering::SeqCst), 1);
    assert!(sink.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn fan_out_respects_the_depth_bound() {
    init_logging();
    let mut pages = HashMap::new();
    pages.insert("/".to_string(), page(&["/a", "/b"], false));
    // `/a` links one level deeper; with crawl depth 1 that link must never
    // be fetched.
    pages.insert("/a".to_string(), page(&["/c"], true));
    pages.insert("/b".to_string(), page(&[], true));
    pages.insert("/c".to_string(), page(&[], true));
    let (seed, hits) = serve(pages, None).await;

    let scheduler = Arc::new(Scheduler::new());
    let items = Arc::new(AtomicUsize::new(0));
    start_crawl(
        &scheduler,
        &seed,
        1,
        ChannelArgs::new(10, 10, 10, 10),
        PoolArgs::new(3, 3),
        Arc::clone(&items),
    );

    let sink = RecordSink::default();
    watch_until_stopped(&scheduler, &sink).await;

    let fetched = unique_paths(&hits);
    assert_eq!(
        fetched,
        HashSet::from(["/".to_string(), "/a".to_string(), "/b".to_string()])
    );
    assert_eq!(hits.lock().unwrap().len(), 3);
    assert_eq!(items.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.summary().url_count(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_links_are_fetched_once() {
    init_logging();
    let dupes = ["/a"; 10];
    let mut pages = HashMap::new();
    pages.insert("/".to_string(), page(&dupes, false));
    pages.insert("/a".to_string(), page(&[], true));
    let (seed, hits) = serve(pages, None).await;

    let scheduler = Arc::new(Scheduler::new());
    let items = Arc::new(AtomicUsize::new(0));
    start_crawl(
        &scheduler,
        &seed,
        1,
        ChannelArgs::new(10, 10, 10, 10),
        PoolArgs::new(2, 2),
        Arc::clone(&items),
    );

    let sink = RecordSink::default();
    watch_until_stopped(&scheduler, &sink).await;

    assert_eq!(hits.lock().unwrap().len(), 2);
    assert_eq!(items.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_domain_links_are_never_fetched() {
    init_logging();
    let mut pages = HashMap::new();
    pages.insert(
        "/".to_string(),
        page(&["http://other.test/x", "/a"], false),
    );
    pages.insert("/a".to_string(), page(&[], true));
    let (seed, hits) = serve(pages, None).await;

    let scheduler = Arc::new(Scheduler::new());
    let items = Arc::new(AtomicUsize::new(0));
    start_crawl(
        &scheduler,
        &seed,
        1,
        ChannelArgs::new(10, 10, 10, 10),
        PoolArgs::new(2, 2),
        Arc::clone(&items),
    );

    let sink = RecordSink::default();
    watch_until_stopped(&scheduler, &sink).await;

    let fetched = unique_paths(&hits);
    assert_eq!(fetched, HashSet::from(["/".to_string(), "/a".to_string()]));
    // The foreign link is dropped at admission with a warning, not reported
    // as a crawler error.
    assert!(sink.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn a_single_downloader_still_covers_every_link() {
    init_logging();
    let paths: Vec<String> = (0..20).map(|i| format!("/p{i}")).collect();
    let mut pages = HashMap::new();
    let links: Vec<&str> = paths.iter().map(String::as_str).collect();
    pages.insert("/".to_string(), page(&links, false));
    for path in &paths {
        pages.insert(path.clone(), page(&[], true));
    }
    let (seed, hits) = serve(pages, None).await;

    let scheduler = Arc::new(Scheduler::new());
    let items = Arc::new(AtomicUsize::new(0));
    start_crawl(
        &scheduler,
        &seed,
        1,
        ChannelArgs::new(4, 4, 4, 16),
        // One downloader throttles the whole crawl; the analyzers are sized
        // so no response is ever dropped for want of an entity.
        PoolArgs::new(1, 21),
        Arc::clone(&items),
    );

    let sink = RecordSink::default();
    watch_until_stopped(&scheduler, &sink).await;

    let mut expected: HashSet<String> = paths.iter().cloned().collect();
    expected.insert("/".to_string());
    assert_eq!(unique_paths(&hits), expected);
    // Each admitted URL makes exactly one round-trip even when pool-empty
    // retries shuffle it back through the backlog.
    assert_eq!(hits.lock().unwrap().len(), expected.len());
    assert_eq!(items.load(Ordering::SeqCst), 20);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_mid_crawl_halts_the_frontier() {
    init_logging();
    let paths: Vec<String> = (0..100).map(|i| format!("/p{i}")).collect();
    let mut pages = HashMap::new();
    let links: Vec<&str> = paths.iter().map(String::as_str).collect();
    pages.insert("/".to_string(), page(&links, false));
    for path in &paths {
        pages.insert(path.clone(), page(&[], true));
    }
    let (seed, hits) = serve(pages, Some(Duration::from_millis(30))).await;

    let scheduler = Arc::new(Scheduler::new());
    let items = Arc::new(AtomicUsize::new(0));
    start_crawl(
        &scheduler,
        &seed,
        1,
        ChannelArgs::new(5, 5, 5, 5),
        PoolArgs::new(2, 2),
        Arc::clone(&items),
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(scheduler.stop());
    assert!(!scheduler.stop());
    assert!(!scheduler.running());
    assert!(scheduler.error_receiver().is_none());
    assert!(!scheduler.summary().running());

    // Give in-flight downloads and the pump time to settle, then confirm no
    // further requests leave the backlog.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let settled = hits.lock().unwrap().len();
    assert!(settled < 100, "the crawl was not interrupted ({settled} fetches)");
    assert!(scheduler.stop_deal_total() >= 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(hits.lock().unwrap().len(), settled);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_downloads_reach_the_monitor() {
    init_logging();
    // A dead port on the loopback host: admission accepts it (same primary
    // domain) but the round-trip fails.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let mut pages = HashMap::new();
    pages.insert(
        "/".to_string(),
        page(&[&format!("http://{dead_addr}/gone"), "/a"], false),
    );
    pages.insert("/a".to_string(), page(&[], true));
    let (seed, hits) = serve(pages, None).await;

    let scheduler = Arc::new(Scheduler::new());
    let items = Arc::new(AtomicUsize::new(0));
    start_crawl(
        &scheduler,
        &seed,
        1,
        ChannelArgs::new(10, 10, 10, 10),
        PoolArgs::new(2, 2),
        Arc::clone(&items),
    );

    let sink = RecordSink::default();
    watch_until_stopped(&scheduler, &sink).await;

    assert_eq!(unique_paths(&hits), HashSet::from(["/".to_string(), "/a".to_string()]));
    assert_eq!(items.load(Ordering::SeqCst), 1);
    let errors = sink.errors();
    assert!(
        errors.iter().any(|text| text.contains("downloader error")),
        "expected a downloader error record, got {errors:?}"
    );
}
