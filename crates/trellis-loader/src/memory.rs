//! In-memory implementations of the loader seams
//!
//! Suitable for tests and for hosts that embed their manifest and remotes
//! instead of fetching them. Production hosts wire [`HttpManifestSource`]
//! and a real dynamic-load backed [`ArtifactLoader`] behind the same traits.
//!
//! [`HttpManifestSource`]: crate::address_book::HttpManifestSource

use crate::address_book::ManifestSource;
use crate::contract::{ArtifactLoader, RawArtifact};
use crate::stylesheet::StylesheetSink;
use crate::LoaderResult;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use trellis_types::{RemoteError, RemoteManifest, StylesheetError};

/// Manifest source returning a fixed manifest.
pub struct InMemoryManifestSource {
    manifest: RemoteManifest,
}

impl InMemoryManifestSource {
    pub fn new(manifest: RemoteManifest) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl ManifestSource for InMemoryManifestSource {
    async fn fetch_manifest(&self) -> LoaderResult<RemoteManifest> {
        Ok(self.manifest.clone())
    }
}

/// Artifact loader serving registered artifacts by address.
///
/// Unregistered addresses fail with a load-stage error; the attempt counter
/// makes retry behavior observable.
pub struct InMemoryArtifactLoader {
    artifacts: DashMap<String, RawArtifact>,
    attempts: AtomicU64,
}

impl InMemoryArtifactLoader {
    pub fn new() -> Self {
        Self {
            artifacts: DashMap::new(),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn insert(&self, address: impl Into<String>, artifact: RawArtifact) {
        self.artifacts.insert(address.into(), artifact);
    }

    pub fn remove(&self, address: &str) {
        self.artifacts.remove(address);
    }

    /// Total load attempts across all addresses.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryArtifactLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactLoader for InMemoryArtifactLoader {
    async fn load(&self, address: &str) -> LoaderResult<RawArtifact> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.artifacts
            .get(address)
            .map(|a| a.clone())
            .ok_or_else(|| {
                RemoteError::load(format!("Dynamic load of {address} failed: not found"))
            })
    }
}

/// Artifact loader whose loads never resolve, for timeout tests.
pub struct PendingArtifactLoader {
    attempts: AtomicU64,
}

impl PendingArtifactLoader {
    pub fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
        }
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for PendingArtifactLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactLoader for PendingArtifactLoader {
    async fn load(&self, _address: &str) -> LoaderResult<RawArtifact> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        futures::future::pending().await
    }
}

/// Stylesheet sink recording every injection attempt.
pub struct RecordingStylesheetSink {
    injected: Mutex<Vec<String>>,
    failures: DashSet<String>,
}

impl RecordingStylesheetSink {
    pub fn new() -> Self {
        Self {
            injected: Mutex::new(Vec::new()),
            failures: DashSet::new(),
        }
    }

    /// Make injections of `address` fail until [`clear_failures`] is called.
    ///
    /// [`clear_failures`]: Self::clear_failures
    pub fn fail_address(&self, address: impl Into<String>) {
        self.failures.insert(address.into());
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Every address handed to the sink, in order, including failed ones.
    pub fn injected(&self) -> Vec<String> {
        self.injected
            .lock()
            .expect("recording sink lock poisoned")
            .clone()
    }
}

impl Default for RecordingStylesheetSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StylesheetSink for RecordingStylesheetSink {
    async fn inject(&self, address: &str) -> Result<(), StylesheetError> {
        self.injected
            .lock()
            .expect("recording sink lock poisoned")
            .push(address.to_string());

        if self.failures.contains(address) {
            return Err(StylesheetError::new(address, "link failed to load"));
        }
        Ok(())
    }
}
