//! Debug Adapter Protocol binding of the remote operations.

mod client;
pub mod protocol;
pub mod tracer;
pub mod transport;

pub use client::{DapClient, EVENT_BACKLOG};
