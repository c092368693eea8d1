use thiserror::Error;

/// Error surface of the daemon runtime. Only startup failures (bind, missing
/// log directory) and task-join failures reach this; per-client and per-event
/// failures are isolated inside their components.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to build tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] snapwatch_core::ConfigError),

    #[error("server error: {0}")]
    Server(#[from] snapwatch_server::ServerError),

    #[error("tailer error: {0}")]
    Tailer(#[from] snapwatch_tailer::TailerError),

    #[error("cannot determine the observed log directory; set upworkLogsDir or UPWORK_LOGS_DIR")]
    LogsDirUnknown,

    #[error("signal handler failed: {0}")]
    Signal(#[source] std::io::Error),

    #[error("{task} task join failure: {source}")]
    Join {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}
