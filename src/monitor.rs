//! External observer for a running scheduler.
//!
//! `monitoring` watches a [`Scheduler`] from the outside: it drains the
//! error queue into the record callback, logs a summary whenever the
//! observable state changes, and watches the idle predicate. Once the
//! scheduler has stayed idle for a full streak of checks it can stop the
//! crawl on the caller's behalf.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use crate::scheduler::{SchedSummary, Scheduler};

/// Severity of a monitor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLevel {
    Normal,
    Warning,
    Error,
}

/// Sink for monitor output. Treated as fire-and-forget.
pub type Record = Arc<dyn Fn(RecordLevel, &str) + Send + Sync>;

/// Smallest accepted check interval.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);
/// Smallest accepted idle streak; anything lower stops crawls that are
/// merely between pump ticks.
const MIN_IDLE_COUNT: usize = 1000;

/// Starts monitoring `scheduler` and returns a one-shot channel that will
/// carry the idle watcher's final check count.
///
/// Three tasks run until the idle watcher finishes: an error drainer
/// (records at [`RecordLevel::Error`]), a summary recorder (records a
/// snapshot whenever the scheduler summary or the runtime's task count
/// changes), and the idle watcher itself. With `auto_stop` set, a full idle
/// streak of `max_idle_count` checks stops the scheduler.
pub fn monitoring(
    scheduler: Arc<Scheduler>,
    check_interval: Duration,
    max_idle_count: usize,
    auto_stop: bool,
    detail_summary: bool,
    record: Record,
) -> oneshot::Receiver<u64> {
    let check_interval = check_interval.max(MIN_CHECK_INTERVAL);
    let max_idle_count = max_idle_count.max(MIN_IDLE_COUNT);

    // One unit per subscriber; the idle watcher pushes both on exit.
    let (notifier_tx, notifier_rx) = kanal::bounded_async::<()>(2);

    spawn_error_drainer(
        Arc::clone(&scheduler),
        Arc::clone(&record),
        notifier_rx.clone(),
    );
    spawn_summary_recorder(
        Arc::clone(&scheduler),
        detail_summary,
        Arc::clone(&record),
        notifier_rx,
    );

    let (count_tx, count_rx) = oneshot::channel();
    spawn_idle_watcher(
        scheduler,
        check_interval,
        max_idle_count,
        auto_stop,
        record,
        notifier_tx,
        count_tx,
    );
    count_rx
}

async fn wait_for_start(scheduler: &Scheduler) {
    while !scheduler.running() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

fn spawn_error_drainer(
    scheduler: Arc<Scheduler>,
    record: Record,
    notifier: kanal::AsyncReceiver<()>,
) {
    tokio::spawn(async move {
        wait_for_start(&scheduler).await;
        let Some(err_rx) = scheduler.error_receiver() else {
            return;
        };
        loop {
            tokio::select! {
                _ = notifier.recv() => {
                    debug!("error drainer notified to stop");
                    return;
                }
                result = err_rx.recv() => match result {
                    Ok(err) => record(
                        RecordLevel::Error,
                        &format!("error received from the error channel: {err}"),
                    ),
                    Err(_) => return,
                }
            }
        }
    });
}

fn spawn_summary_recorder(
    scheduler: Arc<Scheduler>,
    detail_summary: bool,
    record: Record,
    notifier: kanal::AsyncReceiver<()>,
) {
    tokio::spawn(async move {
        wait_for_start(&scheduler).await;
        let start_time = Instant::now();
        let mut record_count: u64 = 1;
        let mut prev_summary: Option<SchedSummary> = None;
        let mut prev_tasks: usize = 0;
        loop {
            match notifier.try_recv() {
                Ok(Some(_)) | Err(_) => {
                    debug!("summary recorder notified to stop");
                    return;
                }
                Ok(None) => {}
            }
            let alive_tasks = tokio::runtime::Handle::current().metrics().num_alive_tasks();
            let summary = scheduler.summary();
            if alive_tasks != prev_tasks || prev_summary.as_ref() != Some(&summary) {
                let summary_text = if detail_summary {
                    summary.detail()
                } else {
                    summary.to_string()
                };
                record(
                    RecordLevel::Normal,
                    &format!(
                        "monitor snapshot [{record_count}]:\n\
                         alive tasks: {alive_tasks}\n\
                         scheduler: {summary_text}\n\
                         elapsed: {:?}",
                        start_time.elapsed()
                    ),
                );
                prev_tasks = alive_tasks;
                prev_summary = Some(summary);
                record_count += 1;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn spawn_idle_watcher(
    scheduler: Arc<Scheduler>,
    check_interval: Duration,
    max_idle_count: usize,
    auto_stop: bool,
    record: Record,
    notifier_tx: kanal::AsyncSender<()>,
    count_tx: oneshot::Sender<u64>,
) {
    tokio::spawn(async move {
        wait_for_start(&scheduler).await;
        let mut check_count: u64 = 0;
        let mut idle_count: usize = 0;
        let mut first_idle: Option<Instant> = None;
        loop {
            if scheduler.idle() {
                idle_count += 1;
                if idle_count == 1 {
                    first_idle = Some(Instant::now());
                }
                if idle_count >= max_idle_count {
                    let idle_for = first_idle.map(|at| at.elapsed()).unwrap_or_default();
                    record(
                        RecordLevel::Normal,
                        &format!(
                            "the scheduler has been idle for about {idle_for:?}; \
                             considering whether to stop it"
                        ),
                    );
                    // Re-check: the streak may have ended between the last
                    // sleep and now.
                    if scheduler.idle() {
                        if auto_stop {
                            let result = if scheduler.stop() {
                                "success"
                            } else {
                                "failure"
                            };
                            record(RecordLevel::Normal, &format!("stop scheduler... {result}"));
                        }
                        break;
                    }
                    idle_count = 0;
                    first_idle = None;
                }
            } else {
                idle_count = 0;
                first_idle = None;
            }
            check_count += 1;
            tokio::time::sleep(check_interval).await;
        }
        let _ = notifier_tx.send(()).await;
        let _ = notifier_tx.send(()).await;
        let _ = count_tx.send(check_count);
    });
}
