//! Remote memory acquisition for debugger-side buffer visualizers.
//!
//! Given a debug session and a variable, [`acquire::Acquirer`] finds where the
//! variable buffer lives in the debuggee, decides by sampling whether it
//! changed since last render and, if so, pulls the whole buffer through the
//! debug adapter in parallel chunks.

pub mod acquire;
pub mod address;
pub mod backend;
pub mod cache;
pub mod config;
pub mod dap;
pub mod error;
pub mod reader;
pub mod resolve;
pub mod sample;
pub mod session;

pub use acquire::{Acquirer, AcquireRequest, Acquisition, Fetched, Liveness};
pub use address::{Address, ByteRange};
pub use backend::{Backend, Shape};
pub use cache::{CacheKey, StalenessCache};
pub use config::AcquireConfig;
pub use error::Error;
pub use reader::{ChunkedReader, PartialRead, ReadOutcome};
pub use sample::Fingerprint;
pub use session::{DebugRpc, Session, SessionId, VariableDescriptor};
