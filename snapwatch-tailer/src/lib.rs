//! Watches the observed application's rolling log directory and emits one
//! [`snapwatch_core::LogEvent`] per newly written capture line, surviving
//! rename rotation, copy-truncate rotation, and daily file rollover.

mod error;

pub mod monitor;
pub mod selector;

pub use error::TailerError;
pub use monitor::{run, CAPTURE_SIGNATURE};
pub use selector::find_latest_log;
