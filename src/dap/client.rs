use crate::address::Address;
use crate::dap::protocol::{
    DapIncoming, DapRequest, EvaluateArguments, EvaluateBody, ReadMemoryArguments,
    ReadMemoryBody, VariablesArguments, VariablesBody,
};
use crate::dap::tracer::FileTracer;
use crate::dap::transport::{FramedReader, FramedWriter};
use crate::error::Error;
use crate::session::{ChildVariable, DebugRpc, EvaluateRequest, EvaluateResponse};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Unconsumed events kept per connection, older ones are dropped first.
pub const EVENT_BACKLOG: usize = 256;

/// State shared between a client and its router thread.
#[derive(Default)]
struct Shared {
    pending: Mutex<HashMap<i64, mpsc::Sender<DapIncoming>>>,
    events: Mutex<VecDeque<DapIncoming>>,
    event_ready: Condvar,
    closed: AtomicBool,
}

impl Shared {
    fn push_event(&self, event: DapIncoming) {
        let Ok(mut events) = self.events.lock() else {
            return;
        };
        if events.len() == EVENT_BACKLOG {
            if let Some(dropped) = events.pop_front() {
                debug!(target: "dap", "event backlog full, drop {:?}", dropped.event);
            }
        }
        events.push_back(event);
        self.event_ready.notify_all();
    }

    fn close(&self) {
        // set before draining so that late requests see it
        self.closed.store(true, Ordering::Release);
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
        // waiters check `closed` under this lock
        drop(self.events.lock());
        self.event_ready.notify_all();
    }

    fn forget(&self, seq: i64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&seq);
        }
    }
}

/// Debug adapter connection able to serve several requests in flight.
///
/// A background thread reads every inbound message, responses are routed to
/// the waiting caller by `request_seq`, events are queued up to [`EVENT_BACKLOG`].
/// Dropping the client shuts the connection down and ends the router thread.
pub struct DapClient {
    writer: Mutex<FramedWriter<TcpStream>>,
    stream: TcpStream,
    next_seq: AtomicI64,
    shared: Arc<Shared>,
}

impl DapClient {
    pub fn connect(addr: SocketAddr, tracer: Option<FileTracer>) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = FramedReader::new(stream.try_clone()?, tracer.clone());
        let writer = FramedWriter::new(stream.try_clone()?, tracer);

        let shared = Arc::new(Shared::default());
        thread::Builder::new().name("memviz-dap-router".into()).spawn({
            let shared = shared.clone();
            move || {
                route_incoming(reader, &shared);
                shared.close();
            }
        })?;

        Ok(Self {
            writer: Mutex::new(writer),
            stream,
            next_seq: AtomicI64::new(1),
            shared,
        })
    }

    /// Send a request and wait for its response body.
    pub fn request<A: Serialize>(&self, command: &str, arguments: A) -> Result<Value, Error> {
        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
        let (sender, receiver) = mpsc::channel();
        self.shared
            .pending
            .lock()
            .map_err(|_| Error::SessionClosed)?
            .insert(seq, sender);
        if self.shared.closed.load(Ordering::Acquire) {
            self.shared.forget(seq);
            return Err(Error::SessionClosed);
        }

        let request = serde_json::to_value(arguments).map(|arguments| DapRequest {
            seq,
            r#type: "request",
            command,
            arguments,
        });
        let written = request.map_err(Error::from).and_then(|request| {
            self.writer
                .lock()
                .map_err(|_| Error::SessionClosed)
                .and_then(|mut w| w.write_message(&request))
        });
        if let Err(e) = written {
            self.shared.forget(seq);
            return Err(e);
        }

        // router drops every sender when the connection is gone
        let response = receiver.recv().map_err(|_| Error::SessionClosed)?;
        if response.success != Some(true) {
            return Err(Error::Request {
                command: command.to_string(),
                message: response.message.unwrap_or_else(|| "unknown error".into()),
            });
        }
        Ok(response.body.unwrap_or(Value::Null))
    }

    fn request_typed<A: Serialize, B: DeserializeOwned>(
        &self,
        command: &'static str,
        arguments: A,
    ) -> Result<B, Error> {
        let body = self.request(command, arguments)?;
        serde_json::from_value(body).map_err(|e| Error::MalformedResponse(command, e.to_string()))
    }

    /// Wait for an event with a given name, earlier events are discarded.
    pub fn wait_event(&self, name: &str, timeout: Duration) -> Result<Value, Error> {
        let deadline = Instant::now() + timeout;
        let mut events = self.shared.events.lock().map_err(|_| Error::SessionClosed)?;
        loop {
            while let Some(event) = events.pop_front() {
                if event.event.as_deref() == Some(name) {
                    return Ok(event.body.unwrap_or(Value::Null));
                }
                debug!(target: "dap", "skip event {:?}", event.event);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(Error::SessionClosed);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::TransportTimeout("event", timeout));
            }
            events = self
                .shared
                .event_ready
                .wait_timeout(events, remaining)
                .map_err(|_| Error::SessionClosed)?
                .0;
        }
    }

    /// Number of received events nobody waited for yet.
    pub fn queued_events(&self) -> usize {
        self.shared.events.lock().map_or(0, |events| events.len())
    }
}

impl Drop for DapClient {
    fn drop(&mut self) {
        _ = self.stream.shutdown(Shutdown::Both);
    }
}

fn route_incoming(mut reader: FramedReader<TcpStream>, shared: &Shared) {
    loop {
        let message = match reader.read_message() {
            Ok(message) => message,
            Err(Error::SessionClosed) => break,
            Err(e) => {
                warn!(target: "dap", "connection lost: {e:#}");
                break;
            }
        };
        let incoming: DapIncoming = match serde_json::from_value(message) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(target: "dap", "unexpected message: {e:#}");
                continue;
            }
        };

        match incoming.r#type.as_str() {
            "response" => {
                let waiter = incoming
                    .request_seq
                    .and_then(|seq| shared.pending.lock().ok()?.remove(&seq));
                match waiter {
                    Some(waiter) => {
                        _ = waiter.send(incoming);
                    }
                    None => debug!(target: "dap", "response without waiter: {:?}", incoming.command),
                }
            }
            "event" => shared.push_event(incoming),
            other => debug!(target: "dap", "ignore message of type {other}"),
        }
    }
}

impl DebugRpc for DapClient {
    fn evaluate(&self, request: EvaluateRequest) -> Result<EvaluateResponse, Error> {
        let body: EvaluateBody = self.request_typed(
            "evaluate",
            EvaluateArguments {
                expression: &request.expression,
                frame_id: request.frame_id,
                context: &request.context,
            },
        )?;
        Ok(EvaluateResponse {
            result: body.result,
            memory_reference: body.memory_reference,
        })
    }

    fn list_children(&self, parent_ref: i64) -> Result<Vec<ChildVariable>, Error> {
        let body: VariablesBody = self.request_typed(
            "variables",
            VariablesArguments {
                variables_reference: parent_ref,
            },
        )?;
        Ok(body
            .variables
            .into_iter()
            .map(|v| ChildVariable {
                name: v.name,
                value: v.value,
                memory_reference: v.memory_reference,
                children_reference: (v.variables_reference > 0).then_some(v.variables_reference),
            })
            .collect())
    }

    fn read_memory(&self, base: Address, offset: u64, count: u64) -> Result<String, Error> {
        let body: ReadMemoryBody = self.request_typed(
            "readMemory",
            ReadMemoryArguments {
                memory_reference: base.to_string(),
                offset,
                count,
            },
        )?;
        if let Some(unreadable) = body.unreadable_bytes.filter(|n| *n > 0) {
            debug!(target: "dap", "{unreadable} unreadable bytes at {base}+{offset:#x}");
        }
        Ok(body.data.unwrap_or_default())
    }
}
