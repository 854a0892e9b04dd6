use crate::address::Address;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("config parsing error: {0}")]
    Config(#[from] toml::de::Error),

    // --------------------------------- transport errors ------------------------------------------
    #[error("debug session closed")]
    SessionClosed,
    #[error("`{0}` request timed out after {1:?}")]
    TransportTimeout(&'static str, Duration),
    #[error("`{command}` request failed: {message}")]
    Request { command: String, message: String },
    #[error("malformed `{0}` response: {1}")]
    MalformedResponse(&'static str, String),

    // --------------------------------- address errors --------------------------------------------
    #[error("`{0}` is not a hexadecimal address")]
    AddressSyntax(String),
    #[error("address {0} is null or near-null")]
    NearNullAddress(Address),
    #[error("range of {len} bytes at {base} runs past the end of the address space")]
    RangeOverflow { base: Address, len: u64 },
    #[error("no valid address found for `{0}`")]
    ResolutionFailure(String),
    #[error("no integer value in evaluation result `{0}`")]
    NotAnInteger(String),

    // --------------------------------- remote memory errors --------------------------------------
    #[error("memory read at {0}+{1:#x} returned no data")]
    EmptyChunk(Address, u64),
    #[error("memory read at {0}+{1:#x}: invalid payload: {2}")]
    ChunkPayload(Address, u64, base64::DecodeError),
    #[error("memory read at {base}+{offset:#x}: requested {expected} bytes, got {got}")]
    ChunkLength {
        base: Address,
        offset: u64,
        expected: u64,
        got: usize,
    },
    #[error("read of {len} bytes exceeds the {limit} bytes limit")]
    ReadTooLarge { len: u64, limit: u64 },
    #[error("build reader pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("memory read of {len} bytes at {base} failed: {reason}")]
    TotalReadFailure {
        base: Address,
        len: u64,
        reason: String,
    },
}

impl Error {
    /// Return a hint to a caller - the session is still usable after error or not.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::IO(_) => true,
            Error::SessionClosed => true,

            Error::Json(_) => false,
            Error::Config(_) => false,
            Error::TransportTimeout(_, _) => false,
            Error::Request { .. } => false,
            Error::MalformedResponse(_, _) => false,
            Error::AddressSyntax(_) => false,
            Error::NearNullAddress(_) => false,
            Error::RangeOverflow { .. } => false,
            Error::ResolutionFailure(_) => false,
            Error::NotAnInteger(_) => false,
            Error::EmptyChunk(_, _) => false,
            Error::ChunkPayload(_, _, _) => false,
            Error::ChunkLength { .. } => false,
            Error::ReadTooLarge { .. } => false,
            Error::WorkerPool(_) => true,
            Error::TotalReadFailure { .. } => false,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $target: literal, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: $target, "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $target: literal, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: $target, concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($target: literal, $res: expr) => {
        $crate::_error!(log::warn, $target, $res)
    };
    ($target: literal, $res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $target, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($target: literal, $res: expr) => {
        $crate::_error!(log::debug, $target, $res)
    };
    ($target: literal, $res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $target, $res, $msg)
    };
}
