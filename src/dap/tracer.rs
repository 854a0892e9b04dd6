//! Optional dump of the DAP traffic, one message per line.

use crate::error::Error;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    /// Adapter to client.
    Inbound,
    /// Client to adapter.
    Outbound,
}

impl Direction {
    fn arrow(self) -> &'static str {
        match self {
            Direction::Inbound => "<-",
            Direction::Outbound => "->",
        }
    }
}

/// Trace file shared by both halves of a connection.
#[derive(Clone)]
pub struct FileTracer {
    out: Arc<Mutex<LineWriter<File>>>,
}

impl FileTracer {
    /// Open (or create) a trace file, new lines are appended.
    pub fn new(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: Arc::new(Mutex::new(LineWriter::new(file))),
        })
    }

    /// Record a message as `<arrow> <type> <command or event> <json>`.
    pub fn trace(&self, direction: Direction, message: &Value) {
        let kind = message["type"].as_str().unwrap_or("?");
        let name = message["command"]
            .as_str()
            .or_else(|| message["event"].as_str())
            .unwrap_or("-");
        if let Ok(mut out) = self.out.lock() {
            _ = writeln!(out, "{} {kind} {name} {message}", direction.arrow());
        }
    }
}
