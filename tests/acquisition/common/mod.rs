use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use memviz::session::{ChildVariable, EvaluateRequest, EvaluateResponse};
use memviz::{
    AcquireConfig, Address, Backend, DebugRpc, Error, Session, SessionId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Scripted debuggee: one memory region, canned evaluation results and child lists.
#[derive(Default)]
pub struct FakeDebugee {
    pub region_base: u64,
    pub memory: Mutex<Vec<u8>>,
    pub evaluations: Mutex<HashMap<String, EvaluateResponse>>,
    pub children: Mutex<HashMap<i64, Vec<ChildVariable>>>,
    /// Absolute addresses whose reads fail.
    pub failing_reads: Mutex<HashSet<u64>>,
    pub read_delay: Option<fn(u64) -> Duration>,
    pub eval_delay: Duration,

    pub evaluate_log: Mutex<Vec<String>>,
    pub list_log: Mutex<Vec<i64>>,
    pub read_log: Mutex<Vec<(u64, u64)>>,
    /// Names of the threads that issued memory reads.
    pub read_threads: Mutex<HashSet<String>>,
}

impl FakeDebugee {
    pub fn with_memory(base: u64, memory: Vec<u8>) -> Self {
        Self {
            region_base: base,
            memory: Mutex::new(memory),
            ..Default::default()
        }
    }

    pub fn script_eval(&self, expression: &str, result: &str, memory_reference: Option<&str>) {
        self.evaluations.lock().unwrap().insert(
            expression.to_string(),
            EvaluateResponse {
                result: result.to_string(),
                memory_reference: memory_reference.map(ToString::to_string),
            },
        );
    }

    pub fn script_children(&self, parent: i64, children: Vec<ChildVariable>) {
        self.children.lock().unwrap().insert(parent, children);
    }

    pub fn fail_read_at(&self, addr: u64) {
        self.failing_reads.lock().unwrap().insert(addr);
    }

    pub fn poke(&self, offset: usize, byte: u8) {
        self.memory.lock().unwrap()[offset] = byte;
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.evaluate_log.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<(u64, u64)> {
        let mut reads = self.read_log.lock().unwrap().clone();
        reads.sort();
        reads
    }

    pub fn read_threads(&self) -> HashSet<String> {
        self.read_threads.lock().unwrap().clone()
    }
}

impl DebugRpc for FakeDebugee {
    fn evaluate(&self, request: EvaluateRequest) -> Result<EvaluateResponse, Error> {
        self.evaluate_log
            .lock()
            .unwrap()
            .push(request.expression.clone());
        if !self.eval_delay.is_zero() {
            thread::sleep(self.eval_delay);
        }
        self.evaluations
            .lock()
            .unwrap()
            .get(&request.expression)
            .cloned()
            .ok_or_else(|| Error::Request {
                command: "evaluate".to_string(),
                message: format!("no symbol in `{}`", request.expression),
            })
    }

    fn list_children(&self, parent_ref: i64) -> Result<Vec<ChildVariable>, Error> {
        self.list_log.lock().unwrap().push(parent_ref);
        self.children
            .lock()
            .unwrap()
            .get(&parent_ref)
            .cloned()
            .ok_or(Error::SessionClosed)
    }

    fn read_memory(&self, base: Address, offset: u64, count: u64) -> Result<String, Error> {
        let addr = base.as_u64() + offset;
        self.read_log.lock().unwrap().push((offset, count));
        let thread_name = thread::current().name().unwrap_or("unnamed").to_string();
        self.read_threads.lock().unwrap().insert(thread_name);
        if let Some(delay) = self.read_delay {
            thread::sleep(delay(offset));
        }
        if self.failing_reads.lock().unwrap().contains(&addr) {
            return Err(Error::Request {
                command: "readMemory".to_string(),
                message: format!("cannot access memory at {addr:#x}"),
            });
        }

        let memory = self.memory.lock().unwrap();
        let start = addr
            .checked_sub(self.region_base)
            .filter(|start| start + count <= memory.len() as u64)
            .ok_or_else(|| Error::Request {
                command: "readMemory".to_string(),
                message: format!("unmapped range {addr:#x}+{count}"),
            })? as usize;
        Ok(STANDARD.encode(&memory[start..start + count as usize]))
    }
}

pub fn session(debugee: &Arc<FakeDebugee>, backend: Backend) -> Session {
    Session::new(SessionId::new("test-session"), backend, debugee.clone()).with_frame(1000)
}

pub fn config(chunk_size: u64, concurrency: usize) -> AcquireConfig {
    AcquireConfig {
        chunk_size,
        concurrency,
        eval_timeout_ms: 1000,
        ..Default::default()
    }
}

pub fn child(name: &str, value: &str, memory_reference: Option<&str>) -> ChildVariable {
    ChildVariable {
        name: name.to_string(),
        value: value.to_string(),
        memory_reference: memory_reference.map(ToString::to_string),
        children_reference: None,
    }
}

pub fn expandable(name: &str, children_reference: i64) -> ChildVariable {
    ChildVariable {
        name: name.to_string(),
        value: "{...}".to_string(),
        memory_reference: None,
        children_reference: Some(children_reference),
    }
}

/// `len` bytes of a recognizable pattern.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}
