//! The tail loop: follows the newest matching log file across appends,
//! rename/create/remove rotation, copy-truncate rotation, and a forced
//! re-scan at local midnight.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Days, Local, SecondsFormat, TimeDelta, TimeZone};
use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Instant};

use snapwatch_core::paths::has_observed_prefix;
use snapwatch_core::timestamp::parse_bracketed_timestamp;
use snapwatch_core::LogEvent;

use crate::error::{io_err, TailerError};
use crate::selector::find_latest_log;

/// Literal substring identifying a capture line.
pub const CAPTURE_SIGNATURE: &str = "Electron Screensnap succeeded";

/// Trailing window over which emitted timestamps are remembered.
const DEDUP_WINDOW_HOURS: i64 = 48;

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Tail the newest matching log file in `dir`, sending each newly observed
/// capture event on `events_tx` exactly once. Runs until `shutdown_rx`
/// fires. Only watcher setup can fail; everything inside the loop is logged
/// and retried at the next event or midnight tick.
pub async fn run(
    dir: PathBuf,
    events_tx: mpsc::Sender<LogEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), TailerError> {
    // Canonicalize so watcher event paths compare equal to selector results.
    let dir = fs::canonicalize(&dir).unwrap_or(dir);

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = recommended_watcher(move |event| {
        let _ = raw_tx.send(event);
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    let mut state = TailState::new();
    if let Err(err) = state.reopen_latest(&dir) {
        tracing::warn!(error = %err, "initial log open failed, will retry");
    }

    let midnight = sleep(until_next_midnight());
    tokio::pin!(midnight);
    tracing::info!(
        dir = %dir.display(),
        "tailer started; next forced re-scan at local midnight",
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,

            () = midnight.as_mut() => {
                tracing::info!("midnight: forcing a re-scan of the log directory");
                if let Err(err) = state.reopen_latest(&dir) {
                    tracing::warn!(error = %err, "midnight log re-scan failed");
                }
                midnight.as_mut().reset(Instant::now() + until_next_midnight());
            }

            maybe_event = raw_rx.recv() => {
                let Some(result) = maybe_event else { break };
                match result {
                    Ok(event) => state.handle_event(&dir, &event, &events_tx).await,
                    Err(err) => tracing::warn!(error = %err, "watcher event error"),
                }
            }
        }
    }

    state.close_current();
    Ok(())
}

struct TailFile {
    path: PathBuf,
    reader: BufReader<File>,
    /// Logical byte position: bytes consumed from the file so far.
    offset: u64,
}

struct TailState {
    current: Option<TailFile>,
    /// Bytes after the last newline seen so far; a line split across two
    /// write events is completed on the next drain.
    partial: String,
    /// Dedup map, keyed by the RFC 3339 nanosecond rendering.
    seen: HashMap<String, DateTime<Local>>,
    /// Strictly-monotone high-water mark over emitted timestamps.
    last_emitted: Option<DateTime<Local>>,
}

enum ReadStep {
    /// One complete line was consumed.
    Line(String),
    /// Nothing further to read until the next filesystem event.
    Idle,
}

impl TailState {
    fn new() -> Self {
        Self {
            current: None,
            partial: String::new(),
            seen: HashMap::new(),
            last_emitted: None,
        }
    }

    async fn handle_event(
        &mut self,
        dir: &Path,
        event: &Event,
        events_tx: &mpsc::Sender<LogEvent>,
    ) {
        if is_rotation_kind(&event.kind)
            && event.paths.iter().any(|path| has_observed_prefix(path))
        {
            tracing::info!(kind = ?event.kind, "filesystem event triggered log re-scan");
            if let Err(err) = self.reopen_latest(dir) {
                tracing::warn!(error = %err, "re-open after rotation event failed");
            }
        }

        if !is_data_kind(&event.kind) {
            return;
        }
        let on_current = self
            .current
            .as_ref()
            .is_some_and(|file| event.paths.iter().any(|path| *path == file.path));
        if on_current {
            self.drain(dir, events_tx).await;
        }
    }

    /// Consume every complete line currently available, emitting matches.
    async fn drain(&mut self, dir: &Path, events_tx: &mpsc::Sender<LogEvent>) {
        loop {
            match self.read_step(dir) {
                ReadStep::Line(line) => {
                    if let Some(event) = self.observe_line(&line) {
                        if events_tx.send(event).await.is_err() {
                            // Receiver gone; shutdown is already in flight.
                            return;
                        }
                    }
                }
                ReadStep::Idle => return,
            }
        }
    }

    fn read_step(&mut self, dir: &Path) -> ReadStep {
        let Some(file) = self.current.as_mut() else {
            return ReadStep::Idle;
        };

        // Copy-truncate rotation keeps the inode: a file shorter than our
        // logical position means it was truncated underneath us.
        if let Ok(meta) = file.reader.get_ref().metadata() {
            if meta.len() < file.offset {
                tracing::info!(
                    path = %file.path.display(),
                    offset = file.offset,
                    size = meta.len(),
                    "file shrank underneath the reader; rewinding to start",
                );
                if let Err(err) = file.reader.seek(SeekFrom::Start(0)) {
                    tracing::warn!(error = %err, "rewind after truncate failed");
                    return ReadStep::Idle;
                }
                file.offset = 0;
                self.partial.clear();
            }
        }

        let mut buf = Vec::new();
        match file.reader.read_until(b'\n', &mut buf) {
            Ok(0) => ReadStep::Idle,
            Ok(read) => {
                file.offset += read as u64;
                let chunk = String::from_utf8_lossy(&buf);
                if buf.ends_with(b"\n") {
                    let mut line = std::mem::take(&mut self.partial);
                    line.push_str(chunk.trim_end_matches(['\r', '\n']));
                    ReadStep::Line(line)
                } else {
                    // In-progress line; completed on a later write.
                    self.partial.push_str(&chunk);
                    ReadStep::Idle
                }
            }
            Err(err) => {
                tracing::warn!(
                    path = %file.path.display(),
                    error = %err,
                    "read error; re-scanning for the newest log",
                );
                if let Err(err) = self.reopen_latest(dir) {
                    tracing::warn!(error = %err, "re-open after read error failed");
                }
                ReadStep::Idle
            }
        }
    }

    /// Apply the line filter and the emission invariants. Returns the event
    /// to deliver, at most once per distinct timestamp within the window.
    fn observe_line(&mut self, line: &str) -> Option<LogEvent> {
        if !line.contains(CAPTURE_SIGNATURE) {
            return None;
        }
        let timestamp = parse_bracketed_timestamp(line)?;
        if self.last_emitted.is_some_and(|last| timestamp <= last) {
            return None;
        }
        let key = dedup_key(timestamp);
        if self.seen.contains_key(&key) {
            return None;
        }
        self.seen.insert(key, timestamp);
        self.last_emitted = Some(timestamp);
        self.prune(timestamp);

        tracing::info!(at = %timestamp.format("%H:%M:%S"), "capture event detected");
        Some(LogEvent {
            timestamp,
            source_line: line.to_string(),
        })
    }

    fn prune(&mut self, now: DateTime<Local>) {
        let window = TimeDelta::hours(DEDUP_WINDOW_HOURS);
        self.seen
            .retain(|_, observed| now.signed_duration_since(*observed) <= window);
    }

    /// Idempotently switch to the newest matching file, positioned at its
    /// end. A no-op when the newest file is already open or none exists.
    fn reopen_latest(&mut self, dir: &Path) -> Result<(), TailerError> {
        let Some(path) = find_latest_log(dir) else {
            return Ok(());
        };
        if self.current.as_ref().is_some_and(|file| file.path == path) {
            return Ok(());
        }

        // Drop the old handle before the open attempt so a failure never
        // leaves a stale descriptor behind.
        self.close_current();

        let file = File::open(&path).map_err(|e| io_err(&path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
        let offset = reader
            .seek(SeekFrom::End(0))
            .map_err(|e| io_err(&path, e))?;
        tracing::info!(path = %path.display(), offset, "tailing log file");
        self.current = Some(TailFile {
            path,
            reader,
            offset,
        });
        Ok(())
    }

    fn close_current(&mut self) {
        self.current = None;
        self.partial.clear();
    }
}

fn dedup_key(timestamp: DateTime<Local>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Rotation schemes announce themselves as create, remove, or rename.
fn is_rotation_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

/// Content writes (including in-place truncation) on the tailed file.
fn is_data_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Other)
    )
}

/// Time until the next local midnight, covering the case where the log name
/// rolls to a new date without any filesystem event near the boundary.
fn until_next_midnight() -> Duration {
    let now = Local::now();
    let fallback = Duration::from_secs(24 * 60 * 60);
    let Some(naive) = (now.date_naive() + Days::new(1)).and_hms_opt(0, 0, 0) else {
        return fallback;
    };
    // A skipped local midnight (DST transition) falls back to a plain day.
    let Some(next) = Local.from_local_datetime(&naive).earliest() else {
        return fallback;
    };
    next.signed_duration_since(now).to_std().unwrap_or(fallback)
}
