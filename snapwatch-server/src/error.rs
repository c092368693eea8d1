use thiserror::Error;

/// Startup and serving failures of the front end. Per-client failures never
/// surface here; they tear down the offending connection only.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("no free candidate port; last bind error: {source}")]
    NoFreePort {
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
