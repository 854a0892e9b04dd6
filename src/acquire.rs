//! End-to-end acquisition: resolve, sample, consult the cache and read.

use crate::address::{Address, ByteRange};
use crate::backend::Shape;
use crate::cache::{CacheKey, StalenessCache};
use crate::config::AcquireConfig;
use crate::error::Error;
use crate::reader::{ChunkedReader, ReadOutcome};
use crate::resolve::Resolver;
use crate::sample::{self, Fingerprint};
use crate::session::{Session, VariableDescriptor};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Disposed flag shared between a visualization panel and its acquisitions.
///
/// Remote calls can not be cancelled, so an acquisition checks the flag after
/// each remote step and drops its result once the panel is gone.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispose(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What to acquire for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireRequest {
    pub shape: Shape,
    /// Buffer size in bytes (element count times element width).
    pub length: u64,
}

/// Freshly read buffer, ready to be rendered.
#[derive(Debug)]
pub struct Fetched {
    pub address: Address,
    pub fingerprint: Fingerprint,
    pub outcome: ReadOutcome,
    key: CacheKey,
}

impl Fetched {
    /// Mark the content as rendered. Partial reads and unsampled buffers are never
    /// committed, return true if the cache was updated.
    pub fn commit(&self, cache: &mut StalenessCache) -> bool {
        if !self.outcome.is_complete() || self.fingerprint.is_empty() {
            return false;
        }
        cache.update(self.key.clone(), self.fingerprint.clone());
        true
    }
}

#[derive(Debug)]
pub enum Acquisition {
    /// Content did not change since last commit.
    Fresh {
        address: Address,
        fingerprint: Fingerprint,
    },
    Fetched(Fetched),
    /// The destination was disposed while the acquisition was running.
    Abandoned,
}

pub struct Acquirer {
    config: AcquireConfig,
    reader: ChunkedReader,
}

impl Acquirer {
    pub fn new(config: AcquireConfig) -> Result<Self, Error> {
        let reader = ChunkedReader::new(&config)?;
        Ok(Self { config, reader })
    }

    pub fn config(&self) -> &AcquireConfig {
        &self.config
    }

    pub fn reader(&self) -> &ChunkedReader {
        &self.reader
    }

    /// Acquire the content of a variable unless the cache says it is unchanged.
    ///
    /// Return [`Error::ResolutionFailure`] if the buffer address can not be found,
    /// [`Error::RangeOverflow`] or [`Error::ReadTooLarge`] for a length that can not
    /// be read and [`Error::TotalReadFailure`] if nothing could be read.
    #[allow(clippy::too_many_arguments)]
    pub fn acquire(
        &self,
        session: &Session,
        descriptor: &VariableDescriptor,
        request: AcquireRequest,
        key: CacheKey,
        cache: &StalenessCache,
        liveness: &Liveness,
        progress: Option<&(dyn Fn(f64) + Sync)>,
    ) -> Result<Acquisition, Error> {
        let resolved = Resolver::new(session, &self.config).resolve(descriptor, request.shape);
        if liveness.is_disposed() {
            return Ok(Acquisition::Abandoned);
        }
        let address = resolved
            .ok_or_else(|| Error::ResolutionFailure(descriptor.name.clone()))?
            .address;
        let range = ByteRange::new(address, request.length)?;
        self.reader.admit(&range)?;

        let fingerprint = sample::sample(session, Some(address), request.length, &self.config);
        if liveness.is_disposed() {
            return Ok(Acquisition::Abandoned);
        }
        if cache.is_fresh(&key, &fingerprint) {
            debug!(target: "cache", "`{}` unchanged, skip read", descriptor.name);
            return Ok(Acquisition::Fresh {
                address,
                fingerprint,
            });
        }

        let outcome = self.reader.read_range(session, range, progress)?;
        if liveness.is_disposed() {
            info!(target: "reader", "`{}` read finished after its panel closed", descriptor.name);
            return Ok(Acquisition::Abandoned);
        }

        Ok(Acquisition::Fetched(Fetched {
            address,
            fingerprint,
            outcome,
            key,
        }))
    }
}
