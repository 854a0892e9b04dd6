//! Cheap change detection for remote buffers.
//!
//! Three small windows (start, middle and end of the buffer) are read and
//! their wire encodings are glued into a fingerprint. The cost does not depend
//! on the buffer size, so sampling can run on every debugger stop. A change
//! that falls between the windows goes unnoticed.

use crate::address::Address;
use crate::config::AcquireConfig;
use crate::error::Error;
use crate::muted_error;
use crate::session::Session;
use log::debug;
use std::fmt::{Display, Formatter};
use std::ops::Range;
use std::thread;

/// Sampled content marker, equal for equal `(address, length, sampled bytes)`.
/// Not a cryptographic digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Start, middle and end windows of a buffer of `total` bytes, each at most `window` long.
pub fn sample_windows(total: u64, window: u64) -> [Range<u64>; 3] {
    let window = window.min(total);
    let middle_start = (total / 2).saturating_sub(window / 2).min(total - window);
    [
        0..window,
        middle_start..middle_start + window,
        total - window..total,
    ]
}

/// Fingerprint `total` bytes at `address`. Return an empty fingerprint if there is
/// nothing to sample or every window read failed.
pub fn sample(
    session: &Session,
    address: Option<Address>,
    total: u64,
    config: &AcquireConfig,
) -> Fingerprint {
    let Some(address) = address else {
        return Fingerprint::empty();
    };
    if total == 0 {
        return Fingerprint::empty();
    }

    let windows = sample_windows(total, config.sample_window);
    let parts: Vec<Option<String>> = thread::scope(|scope| {
        let handles: Vec<_> = windows
            .iter()
            .map(|window| {
                scope.spawn(move || {
                    muted_error!(
                        "sampler",
                        read_window(session, address, window.clone(), config.fingerprint_prefix()),
                        "sample window:"
                    )
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().ok().flatten())
            .collect()
    });

    if parts.iter().all(Option::is_none) {
        debug!(target: "sampler", "no window of {address} could be read");
        return Fingerprint::empty();
    }

    let mut fingerprint = format!("{address}:{total}");
    for part in parts {
        fingerprint.push('|');
        fingerprint.push_str(part.as_deref().unwrap_or_default());
    }
    Fingerprint(fingerprint)
}

fn read_window(
    session: &Session,
    address: Address,
    window: Range<u64>,
    prefix: usize,
) -> Result<String, Error> {
    let mut payload = session.read_memory(address, window.start, window.end - window.start)?;
    if payload.is_empty() {
        return Err(Error::EmptyChunk(address, window.start));
    }
    if payload.is_char_boundary(prefix.min(payload.len())) {
        payload.truncate(prefix);
    }
    Ok(payload)
}
