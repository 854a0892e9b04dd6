//! Debug session handle and the remote operations acquisition relies on.

use crate::address::Address;
use crate::backend::{Backend, Profile};
use crate::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluateRequest {
    pub expression: String,
    pub frame_id: Option<i64>,
    /// Backend dialect (DAP `evaluate` context).
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluateResponse {
    pub result: String,
    /// Raw memory reference as reported by the adapter, not validated.
    pub memory_reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildVariable {
    pub name: String,
    pub value: String,
    pub memory_reference: Option<String>,
    pub children_reference: Option<i64>,
}

/// Remote procedures exposed by a debug adapter.
///
/// Every call may fail at any time, implementations must not panic on transport errors.
pub trait DebugRpc: Send + Sync {
    fn evaluate(&self, request: EvaluateRequest) -> Result<EvaluateResponse, Error>;

    fn list_children(&self, parent_ref: i64) -> Result<Vec<ChildVariable>, Error>;

    /// Read `count` bytes at `base + offset`, return base64 encoded payload.
    fn read_memory(&self, base: Address, offset: u64, count: u64) -> Result<String, Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One debuggee under inspection. Owned by the caller and passed into each acquisition.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    backend: Backend,
    frame_id: Option<i64>,
    rpc: Arc<dyn DebugRpc>,
}

impl Session {
    pub fn new(id: SessionId, backend: Backend, rpc: Arc<dyn DebugRpc>) -> Self {
        Self {
            id,
            backend,
            frame_id: None,
            rpc,
        }
    }

    /// Set current evaluation frame.
    pub fn with_frame(mut self, frame_id: i64) -> Self {
        self.frame_id = Some(frame_id);
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn profile(&self) -> &'static Profile {
        self.backend.profile()
    }

    pub fn frame_id(&self) -> Option<i64> {
        self.frame_id
    }

    /// Evaluate an expression in the backend dialect, give up after `timeout`.
    pub fn evaluate(
        &self,
        expression: &str,
        frame_id: Option<i64>,
        timeout: Duration,
    ) -> Result<EvaluateResponse, Error> {
        let request = EvaluateRequest {
            expression: expression.to_string(),
            frame_id: frame_id.or(self.frame_id),
            context: self.profile().dialect.context.to_string(),
        };
        self.call_detached("evaluate", timeout, move |rpc| rpc.evaluate(request))
    }

    /// Fetch children of a structured variable, give up after `timeout`.
    pub fn list_children(
        &self,
        parent_ref: i64,
        timeout: Duration,
    ) -> Result<Vec<ChildVariable>, Error> {
        self.call_detached("variables", timeout, move |rpc| {
            rpc.list_children(parent_ref)
        })
    }

    /// Read raw memory. No timeout: large reads may legitimately take long.
    pub fn read_memory(&self, base: Address, offset: u64, count: u64) -> Result<String, Error> {
        self.rpc.read_memory(base, offset, count)
    }

    /// Run a remote call on a detached thread and wait at most `timeout` for it.
    ///
    /// Adapters have no cancel verb, a timed out call keeps running and its
    /// result is dropped when it eventually arrives.
    fn call_detached<T, F>(
        &self,
        command: &'static str,
        timeout: Duration,
        call: F,
    ) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DebugRpc) -> Result<T, Error> + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(1);
        let rpc = self.rpc.clone();
        thread::Builder::new()
            .name(format!("memviz-{command}"))
            .spawn(move || {
                // receiver is gone if the caller already timed out
                _ = sender.send(call(rpc.as_ref()));
            })?;

        match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Error::TransportTimeout(command, timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(Error::SessionClosed),
        }
    }
}

/// Snapshot of a variable selected for visualization.
///
/// Child references and frames become invalid once the debuggee resumes, so
/// descriptors must never be kept across debugger steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDescriptor {
    pub name: String,
    pub declared_type: String,
    pub children_reference: Option<i64>,
    pub frame_id: Option<i64>,
}

impl VariableDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            children_reference: None,
            frame_id: None,
        }
    }

    pub fn with_children(mut self, children_reference: i64) -> Self {
        // adapters use 0 for "no children"
        self.children_reference = (children_reference > 0).then_some(children_reference);
        self
    }

    pub fn with_frame(mut self, frame_id: i64) -> Self {
        self.frame_id = Some(frame_id);
        self
    }
}
