//! End-to-end tail scenarios against a real directory and a real watcher:
//! append detection, startup replay suppression, restart behaviour, rename
//! rotation, and copy-truncate rotation.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use snapwatch_core::LogEvent;
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const WATCHER_WARMUP: Duration = Duration::from_millis(300);
const EVENT_DEADLINE: Duration = Duration::from_secs(5);
const QUIET_WINDOW: Duration = Duration::from_millis(1000);

struct TailerUnderTest {
    events: mpsc::Receiver<LogEvent>,
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<Result<(), snapwatch_tailer::TailerError>>,
}

impl TailerUnderTest {
    async fn start(dir: &Path) -> Self {
        let (events_tx, events) = mpsc::channel(16);
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(snapwatch_tailer::run(
            dir.to_path_buf(),
            events_tx,
            shutdown_rx,
        ));
        // Give the watcher a moment to arm before the test mutates files.
        sleep(WATCHER_WARMUP).await;
        Self {
            events,
            shutdown,
            handle,
        }
    }

    async fn expect_event(&mut self, context: &str) -> LogEvent {
        timeout(EVENT_DEADLINE, self.events.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for event: {context}"))
            .unwrap_or_else(|| panic!("tailer closed its channel: {context}"))
    }

    async fn expect_quiet(&mut self, context: &str) {
        if let Ok(Some(event)) = timeout(QUIET_WINDOW, self.events.recv()).await {
            panic!("unexpected event ({context}): {:?}", event.source_line);
        }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = timeout(EVENT_DEADLINE, self.handle)
            .await
            .expect("tailer task did not stop");
    }
}

fn hit_line(ts: &str) -> String {
    format!("[{ts}] [file-transfer-service] (info): Electron Screensnap succeeded.")
}

fn plain_line(ts: &str) -> String {
    format!("[{ts}] [network-service] (info): heartbeat ok")
}

fn append(path: &Path, line: &str) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open for append");
    writeln!(file, "{line}").expect("append line");
    file.flush().expect("flush");
}

fn log_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn append_after_start_is_detected_exactly_once() {
    let dir = TempDir::new().expect("tempdir");
    let log = log_path(&dir, "upwork.20250512.log");
    fs::write(&log, "").expect("create empty log");

    let mut tailer = TailerUnderTest::start(dir.path()).await;

    append(&log, &hit_line("2025-05-12T11:26:23.318"));

    let event = tailer.expect_event("append after start").await;
    assert_eq!(
        event.timestamp.naive_local().to_string(),
        "2025-05-12 11:26:23.318"
    );
    assert!(event.source_line.contains("Electron Screensnap succeeded"));

    tailer.expect_quiet("no second emission for one line").await;
    tailer.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn preexisting_content_is_never_replayed() {
    let dir = TempDir::new().expect("tempdir");
    let log = log_path(&dir, "upwork.20250512.log");
    append(&log, &hit_line("2025-05-12T09:00:00.000"));
    append(&log, &hit_line("2025-05-12T09:05:00.000"));

    let mut tailer = TailerUnderTest::start(dir.path()).await;

    tailer.expect_quiet("existing hits must stay invisible").await;

    // The tailer is positioned at end-of-file, so a fresh hit still lands.
    append(&log, &hit_line("2025-05-12T10:00:00.000"));
    let event = tailer.expect_event("fresh hit after startup").await;
    assert_eq!(
        event.timestamp.naive_local().to_string(),
        "2025-05-12 10:00:00"
    );

    tailer.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_with_the_same_file_does_not_duplicate() {
    let dir = TempDir::new().expect("tempdir");
    let log = log_path(&dir, "upwork.20250512.log");
    fs::write(&log, "").expect("create empty log");

    let mut first = TailerUnderTest::start(dir.path()).await;
    append(&log, &hit_line("2025-05-12T11:00:00.000"));
    first.expect_event("hit before restart").await;
    first.stop().await;

    let mut second = TailerUnderTest::start(dir.path()).await;
    second.expect_quiet("restart must not re-emit").await;

    append(&log, &hit_line("2025-05-12T11:30:00.000"));
    let event = second.expect_event("new hit after restart").await;
    assert_eq!(
        event.timestamp.naive_local().to_string(),
        "2025-05-12 11:30:00"
    );

    second.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rename_style_rotation_keeps_emitting() {
    let dir = TempDir::new().expect("tempdir");
    let old_log = log_path(&dir, "upwork.20250512.log");
    fs::write(&old_log, "").expect("create old log");

    let mut tailer = TailerUnderTest::start(dir.path()).await;

    append(&old_log, &hit_line("2025-05-12T23:59:58.000"));
    tailer.expect_event("hit in the old file").await;

    // A new day's file appears; the tailer must swap over to it.
    let new_log = log_path(&dir, "upwork.20250513.log");
    fs::write(&new_log, "").expect("create new log");
    sleep(WATCHER_WARMUP).await;

    append(&new_log, &hit_line("2025-05-13T00:00:02.000"));
    let event = tailer.expect_event("hit in the new file").await;
    assert_eq!(
        event.timestamp.naive_local().to_string(),
        "2025-05-13 00:00:02"
    );

    tailer.expect_quiet("exactly two events total").await;
    tailer.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn copy_truncate_rotation_keeps_emitting() {
    let dir = TempDir::new().expect("tempdir");
    let log = log_path(&dir, "upwork.20250512.log");
    fs::write(&log, "").expect("create log");

    let mut tailer = TailerUnderTest::start(dir.path()).await;

    // Filler raises the reader offset so the post-truncate file is clearly
    // shorter than the logical position.
    append(&log, &plain_line("2025-05-12T11:00:00.000"));
    append(&log, &plain_line("2025-05-12T11:00:01.000"));
    append(&log, &hit_line("2025-05-12T11:00:02.000"));
    tailer.expect_event("hit before truncation").await;

    // Copy-truncate: contents are copied elsewhere and the file is truncated
    // in place, preserving the inode.
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&log)
        .expect("truncate in place");
    sleep(WATCHER_WARMUP).await;

    append(&log, &hit_line("2025-05-12T11:00:03.000"));
    let event = tailer.expect_event("hit after truncation").await;
    assert_eq!(
        event.timestamp.naive_local().to_string(),
        "2025-05-12 11:00:03"
    );

    tailer.expect_quiet("exactly two events total").await;
    tailer.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tailer_waits_for_the_first_file_to_appear() {
    let dir = TempDir::new().expect("tempdir");

    let mut tailer = TailerUnderTest::start(dir.path()).await;
    tailer.expect_quiet("nothing to tail yet").await;

    let log = log_path(&dir, "upwork.20250512.log");
    fs::write(&log, "").expect("create log");
    sleep(WATCHER_WARMUP).await;

    append(&log, &hit_line("2025-05-12T12:00:00.000"));
    let event = tailer.expect_event("hit in the first-ever file").await;
    assert_eq!(
        event.timestamp.naive_local().to_string(),
        "2025-05-12 12:00:00"
    );

    tailer.stop().await;
}
