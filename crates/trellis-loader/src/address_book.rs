//! Address book - manifest fetch, memoization, and address resolution
//!
//! The manifest is fetched exactly once per [`AddressBook`] instance and
//! cached for the process lifetime; it never expires without explicit
//! invalidation (which is out of scope). Retry belongs to the caller, not
//! this layer.

use crate::LoaderResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use trellis_types::{RemoteError, RemoteManifest};
use url::Url;

/// Transport seam for fetching the manifest resource.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch and parse the manifest. Called at most once per address book.
    async fn fetch_manifest(&self) -> LoaderResult<RemoteManifest>;
}

/// The sole source of remote locations.
pub struct AddressBook {
    source: Arc<dyn ManifestSource>,
    cached: OnceCell<Arc<RemoteManifest>>,
}

impl AddressBook {
    pub fn new(source: Arc<dyn ManifestSource>) -> Self {
        Self {
            source,
            cached: OnceCell::new(),
        }
    }

    /// The memoized manifest, fetching it on first call.
    ///
    /// Concurrent first calls share one fetch; after the first success every
    /// call returns the cached value without touching the source.
    pub async fn resolve(&self) -> LoaderResult<Arc<RemoteManifest>> {
        let manifest = self
            .cached
            .get_or_try_init(|| async {
                let manifest = self.source.fetch_manifest().await?;
                manifest.validate()?;
                info!(remotes = manifest.remotes.len(), "Remote manifest resolved");
                Ok::<_, RemoteError>(Arc::new(manifest))
            })
            .await?;
        Ok(manifest.clone())
    }

    /// Address for `name`, selecting the variant requested by the caller.
    ///
    /// Pure lookup into an already-resolved manifest; fails with a
    /// manifest-resolution error for unknown remotes or missing variants.
    pub fn address_for(
        name: &str,
        variant: Option<&str>,
        manifest: &RemoteManifest,
    ) -> LoaderResult<String> {
        let address = manifest.address_for(name, variant)?;
        debug!(remote = name, variant = ?variant, address, "Resolved remote address");
        Ok(address.to_string())
    }
}

/// Manifest source backed by an HTTP endpoint (the deployed manifest JSON).
pub struct HttpManifestSource {
    url: Url,
    client: reqwest::Client,
}

impl HttpManifestSource {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(url: Url, client: reqwest::Client) -> Self {
        Self { url, client }
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch_manifest(&self) -> LoaderResult<RemoteManifest> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| {
                RemoteError::manifest_with(
                    format!("Failed to fetch remote manifest from {}", self.url),
                    e,
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::manifest(format!(
                "Manifest request to {} returned {status}",
                self.url
            )));
        }

        response.json::<RemoteManifest>().await.map_err(|e| {
            RemoteError::manifest_with(
                format!("Manifest at {} is not a valid remotes mapping", self.url),
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryManifestSource;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        inner: InMemoryManifestSource,
        fetches: AtomicU32,
    }

    #[async_trait]
    impl ManifestSource for CountingSource {
        async fn fetch_manifest(&self) -> LoaderResult<RemoteManifest> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_manifest().await
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ManifestSource for FailingSource {
        async fn fetch_manifest(&self) -> LoaderResult<RemoteManifest> {
            Err(RemoteError::manifest("Manifest request returned 503"))
        }
    }

    fn manifest() -> RemoteManifest {
        serde_json::from_str(r#"{ "remotes": { "status": { "current": "http://h/status.mjs" } } }"#)
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_fetches_exactly_once() {
        let source = Arc::new(CountingSource {
            inner: InMemoryManifestSource::new(manifest()),
            fetches: AtomicU32::new(0),
        });
        let book = AddressBook::new(source.clone());

        let first = book.resolve().await.unwrap();
        let second = book.resolve().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_propagates_source_failure() {
        let book = AddressBook::new(Arc::new(FailingSource));

        let err = book.resolve().await.unwrap_err();
        assert_eq!(err.stage(), trellis_types::ErrorStage::ManifestResolution);
    }

    #[tokio::test]
    async fn test_resolve_rejects_invalid_manifest() {
        let empty_entry: RemoteManifest =
            serde_json::from_str(r#"{ "remotes": { "status": {} } }"#).unwrap();
        let book = AddressBook::new(Arc::new(InMemoryManifestSource::new(empty_entry)));

        assert!(book.resolve().await.is_err());
    }

    #[tokio::test]
    async fn test_address_for_resolves_variant() {
        let m = manifest();

        let address = AddressBook::address_for("status", Some("current"), &m).unwrap();
        assert_eq!(address, "http://h/status.mjs");

        assert!(AddressBook::address_for("billing", None, &m).is_err());
    }
}
