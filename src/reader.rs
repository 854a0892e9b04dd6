//! Bulk memory reads through the debug adapter.
//!
//! A range is split into fixed size chunks which a small pool of workers
//! fetch with independent `readMemory` requests. The channel to the adapter,
//! not the local CPU, is the bottleneck, so the pool stays small.

use crate::address::{Address, ByteRange};
use crate::config::AcquireConfig;
use crate::error::Error;
use crate::session::Session;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use itertools::Itertools;
use log::{debug, warn};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

/// One piece of a range read. `data` is [`None`] for failed (or never requested) chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Offset from the range base.
    pub offset: u64,
    pub len: u64,
    pub data: Option<Vec<u8>>,
}

/// Degraded read result: some chunks are missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRead {
    /// Successfully read chunks concatenated in order, missing ranges are skipped.
    pub data: Vec<u8>,
    /// Missing byte ranges relative to the range base, adjacent ranges are merged.
    pub missing: Vec<Range<u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Complete(Vec<u8>),
    Partial(PartialRead),
}

impl ReadOutcome {
    pub fn data(&self) -> &[u8] {
        match self {
            ReadOutcome::Complete(data) => data,
            ReadOutcome::Partial(partial) => &partial.data,
        }
    }

    pub fn into_data(self) -> Vec<u8> {
        match self {
            ReadOutcome::Complete(data) => data,
            ReadOutcome::Partial(partial) => partial.data,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ReadOutcome::Complete(_))
    }
}

/// Shared state of a single range read.
struct ReadState<'a> {
    session: &'a Session,
    base: Address,
    total: u64,
    chunks: Vec<Range<u64>>,
    slots: Vec<OnceLock<Vec<u8>>>,
    next: AtomicUsize,
    failed: AtomicBool,
    done_bytes: AtomicU64,
    last_error: Mutex<Option<Error>>,
    progress: Option<&'a (dyn Fn(f64) + Sync)>,
}

impl ReadState<'_> {
    /// Claim and fetch chunks until there are none left or a sibling failed.
    fn work(&self) {
        while !self.failed.load(Ordering::Acquire) {
            let idx = self.next.fetch_add(1, Ordering::AcqRel);
            let Some(chunk) = self.chunks.get(idx) else {
                break;
            };

            match fetch_chunk(self.session, self.base, chunk.clone()) {
                Ok(data) => {
                    let len = data.len() as u64;
                    _ = self.slots[idx].set(data);
                    let done = self.done_bytes.fetch_add(len, Ordering::AcqRel) + len;
                    if let Some(progress) = self.progress {
                        progress(done as f64 / self.total as f64);
                    }
                }
                Err(e) => {
                    warn!(target: "reader", "chunk #{idx} failed: {e:#}");
                    self.failed.store(true, Ordering::Release);
                    if let Ok(mut last) = self.last_error.lock() {
                        *last = Some(e);
                    }
                }
            }
        }
    }
}

/// Chunked reader backed by a fixed size worker pool, create once and reuse.
pub struct ChunkedReader {
    pool: rayon::ThreadPool,
    concurrency: usize,
    chunk_size: u64,
    max_read_bytes: u64,
}

impl ChunkedReader {
    pub fn new(config: &AcquireConfig) -> Result<Self, Error> {
        let concurrency = config.concurrency.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|idx| format!("memviz-reader-{idx}"))
            .build()?;
        Ok(Self {
            pool,
            concurrency,
            chunk_size: config.chunk_size.max(1),
            max_read_bytes: config.max_read_bytes,
        })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Refuse a range longer than the configured read limit.
    pub fn admit(&self, range: &ByteRange) -> Result<(), Error> {
        if range.length > self.max_read_bytes {
            return Err(Error::ReadTooLarge {
                len: range.length,
                limit: self.max_read_bytes,
            });
        }
        Ok(())
    }

    /// Read a whole range. Return [`ReadOutcome::Partial`] if some chunks failed,
    /// and [`Error::TotalReadFailure`] if none succeeded.
    ///
    /// `progress` receives the fraction of bytes read so far after every successful chunk.
    pub fn read_range(
        &self,
        session: &Session,
        range: ByteRange,
        progress: Option<&(dyn Fn(f64) + Sync)>,
    ) -> Result<ReadOutcome, Error> {
        if range.length == 0 {
            return Ok(ReadOutcome::Complete(vec![]));
        }
        self.admit(&range)?;

        let chunks: Vec<_> = range.chunks(self.chunk_size).collect();
        let workers = self.concurrency.min(chunks.len());
        debug!(
            target: "reader",
            "read {} bytes at {}: {} chunks, {workers} workers",
            range.length,
            range.base,
            chunks.len()
        );

        let state = ReadState {
            session,
            base: range.base,
            total: range.length,
            slots: chunks.iter().map(|_| OnceLock::new()).collect(),
            chunks,
            next: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
            done_bytes: AtomicU64::new(0),
            last_error: Mutex::new(None),
            progress,
        };

        self.pool.scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| state.work());
            }
        });

        let last_error = state
            .last_error
            .into_inner()
            .ok()
            .flatten()
            .map(|e| e.to_string());
        let chunks = state
            .chunks
            .into_iter()
            .zip(state.slots)
            .enumerate()
            .map(|(index, (range, slot))| Chunk {
                index,
                offset: range.start,
                len: range.end - range.start,
                data: slot.into_inner(),
            })
            .collect::<Vec<_>>();

        match assemble(chunks) {
            (data, missing) if missing.is_empty() => Ok(ReadOutcome::Complete(data)),
            (data, _) if data.is_empty() => Err(Error::TotalReadFailure {
                base: range.base,
                len: range.length,
                reason: last_error.unwrap_or_else(|| "no chunk was read".to_string()),
            }),
            (data, missing) => {
                warn!(
                    target: "reader",
                    "partial read at {}: {} of {} bytes",
                    range.base,
                    data.len(),
                    range.length
                );
                Ok(ReadOutcome::Partial(PartialRead { data, missing }))
            }
        }
    }
}

/// Read and decode one chunk.
fn fetch_chunk(session: &Session, base: Address, chunk: Range<u64>) -> Result<Vec<u8>, Error> {
    let count = chunk.end - chunk.start;
    let payload = session.read_memory(base, chunk.start, count)?;
    if payload.is_empty() {
        return Err(Error::EmptyChunk(base, chunk.start));
    }
    let data = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| Error::ChunkPayload(base, chunk.start, e))?;
    if data.len() as u64 != count {
        return Err(Error::ChunkLength {
            base,
            offset: chunk.start,
            expected: count,
            got: data.len(),
        });
    }
    Ok(data)
}

/// Concatenate present chunks in index order, collect missing ranges.
fn assemble(mut chunks: Vec<Chunk>) -> (Vec<u8>, Vec<Range<u64>>) {
    chunks.sort_by_key(|c| c.index);
    let missing = chunks
        .iter()
        .filter(|c| c.data.is_none())
        .map(|c| c.offset..c.offset + c.len)
        .coalesce(|prev, next| {
            if prev.end == next.start {
                Ok(prev.start..next.end)
            } else {
                Err((prev, next))
            }
        })
        .collect();
    let data = chunks.into_iter().filter_map(|c| c.data).concat();
    (data, missing)
}
