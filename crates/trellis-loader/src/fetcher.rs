//! Remote fetcher - one resolution + load + validation attempt
//!
//! The fetcher performs exactly one attempt and carries no retry logic;
//! resilience wraps it from the outside. The stylesheet co-load is fired on
//! its own task and never gates the code load.

use crate::address_book::AddressBook;
use crate::contract::{ActivationContract, ArtifactLoader};
use crate::stylesheet::{derive_stylesheet_address, DeriveOptions, StylesheetCoLoader};
use crate::LoaderResult;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use trellis_types::{RemoteError, RemoteManifest, VisibilityContext};

pub struct RemoteFetcher {
    stylesheets: Arc<StylesheetCoLoader>,
    artifacts: Arc<dyn ArtifactLoader>,
    derive_options: DeriveOptions,
}

impl RemoteFetcher {
    pub fn new(stylesheets: Arc<StylesheetCoLoader>, artifacts: Arc<dyn ArtifactLoader>) -> Self {
        Self {
            stylesheets,
            artifacts,
            derive_options: DeriveOptions::default(),
        }
    }

    /// Use hash-stripping stylesheet derivation for content-hashed bundles.
    pub fn with_derive_options(mut self, options: DeriveOptions) -> Self {
        self.derive_options = options;
        self
    }

    /// Resolve, co-load the stylesheet, load the code, and validate.
    ///
    /// The variant tag comes from the context's rollout selector. Exactly
    /// one attempt.
    #[instrument(skip(self, manifest, context), fields(rollout = %context.rollout()))]
    pub async fn fetch(
        &self,
        name: &str,
        manifest: &RemoteManifest,
        context: &VisibilityContext,
    ) -> LoaderResult<ActivationContract> {
        let address = AddressBook::address_for(name, Some(context.rollout()), manifest)?;

        // Fire-and-forget: stylesheet failures are logged, never propagated.
        let stylesheet_address = derive_stylesheet_address(&address, self.derive_options);
        let stylesheets = self.stylesheets.clone();
        tokio::spawn(async move {
            if let Err(err) = stylesheets.load(&stylesheet_address).await {
                warn!(error = %err, "Stylesheet co-load failed; continuing without it");
            }
        });

        let raw = self.artifacts.load(&address).await?;
        debug!(remote = name, address = %address, "Remote artifact loaded; validating contract");

        ActivationContract::from_raw(raw).ok_or_else(|| {
            RemoteError::load(format!(
                "Remote \"{name}\" does not export a valid activation contract"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Export, RawArtifact};
    use crate::memory::{InMemoryArtifactLoader, RecordingStylesheetSink};
    use serde_json::json;
    use trellis_types::{Environment, PortalContext, UserIdentity};

    fn manifest() -> RemoteManifest {
        serde_json::from_str(
            r#"{ "remotes": { "status": {
                "current": "http://h/status.mjs",
                "next": "http://h/status-next.mjs"
            } } }"#,
        )
        .unwrap()
    }

    fn context(rollout: &str) -> VisibilityContext {
        VisibilityContext::derive(PortalContext::new(
            Environment::Development,
            UserIdentity::new("u-1", vec![]),
            "en-US",
        ))
        .with_rollout(rollout)
    }

    fn valid_artifact() -> RawArtifact {
        RawArtifact::new().with_export("activate", Export::activate(|_s, _c| async { Ok(()) }))
    }

    fn fetcher(
        artifacts: Arc<InMemoryArtifactLoader>,
        sink: Arc<RecordingStylesheetSink>,
    ) -> RemoteFetcher {
        RemoteFetcher::new(Arc::new(StylesheetCoLoader::new(sink)), artifacts)
    }

    #[tokio::test]
    async fn test_fetch_uses_rollout_variant() {
        let artifacts = Arc::new(InMemoryArtifactLoader::new());
        artifacts.insert("http://h/status-next.mjs", valid_artifact());
        let f = fetcher(artifacts.clone(), Arc::new(RecordingStylesheetSink::new()));

        f.fetch("status", &manifest(), &context("next")).await.unwrap();
        assert_eq!(artifacts.attempts(), 1);
    }

    #[tokio::test]
    async fn test_fetch_coloads_stylesheet_without_gating() {
        let artifacts = Arc::new(InMemoryArtifactLoader::new());
        artifacts.insert("http://h/status.mjs", valid_artifact());
        let sink = Arc::new(RecordingStylesheetSink::new());
        sink.fail_address("http://h/status.css");
        let f = fetcher(artifacts, sink.clone());

        // Code load succeeds even though the stylesheet sink fails.
        f.fetch("status", &manifest(), &context("current")).await.unwrap();

        // Let the spawned co-load run.
        tokio::task::yield_now().await;
        assert_eq!(sink.injected(), vec!["http://h/status.css".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_contract() {
        let artifacts = Arc::new(InMemoryArtifactLoader::new());
        artifacts.insert(
            "http://h/status.mjs",
            RawArtifact::new().with_export("activate", Export::value(json!("not a fn"))),
        );
        let f = fetcher(artifacts, Arc::new(RecordingStylesheetSink::new()));

        let err = f
            .fetch("status", &manifest(), &context("current"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), trellis_types::ErrorStage::Load);
        assert!(err
            .to_string()
            .contains("does not export a valid activation contract"));
    }

    #[tokio::test]
    async fn test_fetch_unknown_remote_is_manifest_stage() {
        let artifacts = Arc::new(InMemoryArtifactLoader::new());
        let f = fetcher(artifacts, Arc::new(RecordingStylesheetSink::new()));

        let err = f
            .fetch("billing", &manifest(), &context("current"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), trellis_types::ErrorStage::ManifestResolution);
    }
}
