//! DAP message framing: a `Content-Length` header block followed by a JSON payload.

use crate::dap::tracer::{Direction, FileTracer};
use crate::error::Error;
use serde::Serialize;
use serde_json::Value;
use std::io::{BufRead, BufReader, Read, Write};

/// Inbound half of a DAP connection.
pub struct FramedReader<R: Read> {
    reader: BufReader<R>,
    tracer: Option<FileTracer>,
}

impl<R: Read> FramedReader<R> {
    pub fn new(reader: R, tracer: Option<FileTracer>) -> Self {
        Self {
            reader: BufReader::new(reader),
            tracer,
        }
    }

    /// Read a single message, [`Error::SessionClosed`] on end of stream.
    pub fn read_message(&mut self) -> Result<Value, Error> {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            let read_n = self.reader.read_line(&mut line)?;
            if read_n == 0 {
                return Err(Error::SessionClosed);
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            if let Some(v) = line.strip_prefix("Content-Length:") {
                let len = v
                    .trim()
                    .parse()
                    .map_err(|_| Error::MalformedResponse("header", line.to_string()))?;
                content_length = Some(len);
            }
        }

        let len = content_length
            .ok_or_else(|| Error::MalformedResponse("header", "missing Content-Length".into()))?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        let msg: Value = serde_json::from_slice(&buf)?;
        if let Some(tracer) = &self.tracer {
            tracer.trace(Direction::Inbound, &msg);
        }
        Ok(msg)
    }
}

/// Outbound half of a DAP connection.
pub struct FramedWriter<W: Write> {
    writer: W,
    tracer: Option<FileTracer>,
}

impl<W: Write> FramedWriter<W> {
    pub fn new(writer: W, tracer: Option<FileTracer>) -> Self {
        Self { writer, tracer }
    }

    pub fn write_message<T: Serialize>(&mut self, message: &T) -> Result<(), Error> {
        let payload = match &self.tracer {
            Some(tracer) => {
                let message = serde_json::to_value(message)?;
                tracer.trace(Direction::Outbound, &message);
                serde_json::to_vec(&message)?
            }
            None => serde_json::to_vec(message)?,
        };
        write!(self.writer, "Content-Length: {}\r\n\r\n", payload.len())?;
        self.writer.write_all(&payload)?;
        self.writer.flush()?;
        Ok(())
    }
}
