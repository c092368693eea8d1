//! Supervisor: builds the runtime, wires tailer → bridge → broadcaster →
//! front end, and propagates shutdown from signals or any exiting task.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use snapwatch_core::config::{self, Config};
use snapwatch_core::paths::expand_tilde;
use snapwatch_core::{LogEvent, WsMessage};
use snapwatch_server::broadcast::broadcast as fan_out;
use snapwatch_server::{bind_candidate_port, serve, AppState};

use crate::error::DaemonError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Grace period after all tasks stop, letting in-flight writes finish.
const SHUTDOWN_QUIESCENCE: Duration = Duration::from_millis(500);

const EVENT_QUEUE_DEPTH: usize = 64;

/// Initialise logging, build the runtime, and block until the daemon exits.
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing(&config.log_path);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DaemonError::Runtime)?;
    runtime.block_on(run(config))
}

/// Run the daemon: tailer, detection bridge, front end, and signal handler,
/// each forwarding shutdown to the others when it exits.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    let logs_dir = config::effective_logs_dir(&config).ok_or(DaemonError::LogsDirUnknown)?;

    let state = Arc::new(AppState::new(VERSION, config.debug_mode));
    let (listener, port) = bind_candidate_port().await?;
    tracing::info!(
        port,
        version = VERSION,
        dir = %logs_dir.display(),
        "snapwatch daemon starting",
    );

    let (events_tx, events_rx) = mpsc::channel::<LogEvent>(EVENT_QUEUE_DEPTH);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let tailer_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = snapwatch_tailer::run(logs_dir, events_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result.map_err(DaemonError::from)
        })
    };

    let bridge_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = bridge_task(state, events_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = serve(listener, state, shutdown.subscribe())
                .await
                .map_err(DaemonError::from);
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let subscription = shutdown.subscribe();
            signal_task(shutdown, subscription).await
        })
    };

    let (tailer_result, bridge_result, server_result, signal_result) =
        tokio::join!(tailer_handle, bridge_handle, server_handle, signal_handle);

    handle_join("tailer", tailer_result)?;
    handle_join("bridge", bridge_result)?;
    handle_join("server", server_result)?;
    handle_join("signal_handler", signal_result)?;

    tokio::time::sleep(SHUTDOWN_QUIESCENCE).await;
    tracing::info!("snapwatch daemon stopped");
    Ok(())
}

/// Detection bridge: turns tailer events into `screenshot_detected`
/// broadcasts.
async fn bridge_task(
    state: Arc<AppState>,
    mut events_rx: mpsc::Receiver<LogEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_event = events_rx.recv() => {
                let Some(event) = maybe_event else { break };
                tracing::debug!(line = %event.source_line, "relaying capture event");
                fan_out(
                    &state.registry,
                    &WsMessage::screenshot_detected(event.timestamp),
                )
                .await;
            }
        }
    }
    Ok(())
}

async fn signal_task(
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    tokio::select! {
        _ = shutdown_rx.recv() => Ok(()),
        signal = wait_for_signal() => match signal {
            Ok(()) => {
                tracing::info!("received shutdown signal");
                let _ = shutdown_tx.send(());
                Ok(())
            }
            Err(err) => Err(DaemonError::Signal(err)),
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(source) => Err(DaemonError::Join { task, source }),
    }
}

fn init_tracing(log_path: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = if log_path.is_empty() {
        None
    } else {
        let path = expand_tilde(log_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = fs::create_dir_all(parent);
            }
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .inspect_err(|err| eprintln!("cannot open log file {}: {err}", path.display()))
            .ok()
    };

    match file {
        Some(file) => {
            let _ = fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stdout.and(std::sync::Mutex::new(file)))
                .try_init();
        }
        None => {
            let _ = fmt().with_env_filter(filter).with_target(false).try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn empty_state() -> Arc<AppState> {
        Arc::new(AppState::new("test", false))
    }

    #[tokio::test]
    async fn bridge_exits_when_the_event_channel_closes() {
        let (events_tx, events_rx) = mpsc::channel::<LogEvent>(4);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let handle = tokio::spawn(bridge_task(
            empty_state(),
            events_rx,
            shutdown_tx.subscribe(),
        ));

        // With no authenticated clients the broadcast is a no-op, but the
        // event must still be consumed without error.
        events_tx
            .send(LogEvent {
                timestamp: Local::now(),
                source_line: "line".to_string(),
            })
            .await
            .expect("send event");
        drop(events_tx);

        handle
            .await
            .expect("join bridge")
            .expect("bridge result");
    }

    #[tokio::test]
    async fn bridge_and_signal_tasks_exit_on_shutdown() {
        let (_events_tx, events_rx) = mpsc::channel::<LogEvent>(4);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let bridge = tokio::spawn(bridge_task(
            empty_state(),
            events_rx,
            shutdown_tx.subscribe(),
        ));
        let signal = tokio::spawn(signal_task(shutdown_tx.clone(), shutdown_tx.subscribe()));

        shutdown_tx.send(()).expect("propagate shutdown");

        bridge.await.expect("join bridge").expect("bridge result");
        signal.await.expect("join signal").expect("signal result");
    }
}
