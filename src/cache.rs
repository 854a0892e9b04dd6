use crate::sample::Fingerprint;
use crate::session::SessionId;
use log::debug;
use std::collections::HashMap;

/// Identifies one visualization instance in one debug session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Visualizer family (`image`, `plot`, `pointcloud`, ...).
    pub kind: String,
    pub session: SessionId,
    /// Panel (usually variable) name.
    pub instance: String,
}

impl CacheKey {
    pub fn new(kind: impl Into<String>, session: SessionId, instance: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            session,
            instance: instance.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
}

/// Fingerprints of the last fully rendered content per visualization.
///
/// Created once per process and passed to acquisitions, it must only be updated
/// after a complete acquisition so that a failed or partial read is never
/// considered fresh.
#[derive(Debug, Default)]
pub struct StalenessCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl StalenessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return true if `fingerprint` matches the last rendered one. Empty
    /// fingerprints (nothing could be sampled) are never fresh.
    pub fn is_fresh(&self, key: &CacheKey, fingerprint: &Fingerprint) -> bool {
        if fingerprint.is_empty() {
            return false;
        }
        self.entries
            .get(key)
            .is_some_and(|entry| &entry.fingerprint == fingerprint)
    }

    pub fn update(&mut self, key: CacheKey, fingerprint: Fingerprint) {
        self.entries.insert(key, CacheEntry { fingerprint });
    }

    /// Drop the entry of a closed panel.
    pub fn forget(&mut self, key: &CacheKey) {
        self.entries.remove(key);
    }

    /// Drop every entry belonging to a finished session.
    pub fn on_session_end(&mut self, session: &SessionId) {
        let before = self.entries.len();
        self.entries.retain(|key, _| &key.session != session);
        debug!(
            target: "cache",
            "session {session} ended, {} entries dropped",
            before - self.entries.len()
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
