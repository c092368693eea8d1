//! Daemon runtime: tailer + detection bridge + front end + signal handling.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{run, start_blocking};
