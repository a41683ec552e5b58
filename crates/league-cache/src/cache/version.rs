//! Per-key version tracking.
//!
//! A version is a non-negative counter that moves only when the fingerprint
//! of a stored value changes. Versions live under a derived key
//! (`<prefix><key>`) in the remote tier, manipulated only through atomic
//! increment and set-if-absent, and are mirrored in a local map so repeated
//! reads stay off the network. Without a remote tier the local map is the
//! only copy.

use dashmap::DashMap;

use super::remote::RemoteTier;
use crate::metrics;

pub struct VersionTracker {
    versions: DashMap<String, u64>,
    /// Versions dropped by [`forget`](Self::forget), answered while the
    /// remote tier cannot be reached.
    last_known: DashMap<String, u64>,
    prefix: String,
    remote: Option<RemoteTier>,
}

impl VersionTracker {
    pub fn new(prefix: impl Into<String>, remote: Option<RemoteTier>) -> Self {
        Self {
            versions: DashMap::new(),
            last_known: DashMap::new(),
            prefix: prefix.into(),
            remote,
        }
    }

    /// Remote key holding the version of `key`.
    pub fn version_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Locally cached version, if any.
    pub fn cached(&self, key: &str) -> Option<u64> {
        self.versions.get(key).map(|v| *v)
    }

    fn last_seen(&self, key: &str) -> Option<u64> {
        self.cached(key)
            .or_else(|| self.last_known.get(key).map(|v| *v))
    }

    /// Current version of `key`, hydrating the local map on first access.
    ///
    /// The remote version key is initialised to 0 when missing. If the remote
    /// tier cannot be reached the call answers the last version seen for the
    /// key (0 if none) without caching it, so a later call retries.
    pub async fn ensure_version(&self, key: &str) -> u64 {
        if let Some(version) = self.cached(key) {
            return version;
        }

        let Some(remote) = &self.remote else {
            return *self.versions.entry(key.to_string()).or_insert(0);
        };

        let version_key = self.version_key(key);
        let stored = match remote.get(&version_key).await {
            Some(bytes) => parse_version(&version_key, &bytes),
            None => match remote.set_if_absent(&version_key, "0").await {
                Some(true) => Some(0),
                // Lost the race to another instance; read what it wrote
                Some(false) => remote
                    .get(&version_key)
                    .await
                    .and_then(|bytes| parse_version(&version_key, &bytes)),
                None => None,
            },
        };

        match stored {
            Some(version) => {
                self.last_known.remove(key);
                *self.versions.entry(key.to_string()).or_insert(version)
            }
            None => self.last_seen(key).unwrap_or(0),
        }
    }

    /// Record a newly stored value for `key` and return its version.
    ///
    /// When the fingerprint is unchanged and a version is already cached,
    /// nothing is incremented. Otherwise the version is incremented atomically
    /// in the remote tier, or locally when there is none or it fails.
    pub async fn bump_version(
        &self,
        key: &str,
        new_fingerprint: &str,
        previous_fingerprint: Option<&str>,
    ) -> u64 {
        if previous_fingerprint == Some(new_fingerprint) {
            if let Some(version) = self.cached(key) {
                return version;
            }
        }

        let remote_next = match &self.remote {
            Some(remote) => remote
                .increment(&self.version_key(key))
                .await
                .map(|v| v.max(0) as u64),
            None => None,
        };
        let next = remote_next.unwrap_or_else(|| self.last_seen(key).unwrap_or(0) + 1);

        self.last_known.remove(key);
        self.versions.insert(key.to_string(), next);
        metrics::record_version_bump();
        tracing::debug!(key = %key, version = next, "version bumped");
        next
    }

    /// Drop the locally cached version (remote untouched).
    pub fn forget(&self, key: &str) {
        if let Some((key, version)) = self.versions.remove(key) {
            self.last_known.insert(key, version);
        }
    }

    /// Drop the version locally and in the remote tier.
    pub async fn delete(&self, key: &str) {
        self.versions.remove(key);
        self.last_known.remove(key);
        if let Some(remote) = &self.remote {
            remote.del(&self.version_key(key)).await;
        }
    }

    pub fn clear(&self) {
        self.versions.clear();
        self.last_known.clear();
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

fn parse_version(version_key: &str, bytes: &[u8]) -> Option<u64> {
    let parsed = std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok());
    if parsed.is_none() {
        tracing::warn!(key = %version_key, "ignoring non-numeric version");
    }
    parsed
}
