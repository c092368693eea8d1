//! Loopback HTTP/WS front end: candidate-port binding, the token
//! challenge/response handshake, and fan-out of capture notifications to
//! every authenticated client.

mod error;

pub mod broadcast;
pub mod connection;
pub mod http;
pub mod registry;

pub use broadcast::broadcast;
pub use error::ServerError;
pub use http::{bind_candidate_port, router, serve, AppState, CANDIDATE_PORTS};
pub use registry::{ClientRegistry, ConnId};
