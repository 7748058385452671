//! Activation contract - artifact model and structural validation
//!
//! A dynamic load produces a [`RawArtifact`]: an opaque table of named
//! exports whose values may or may not be callable. Nothing in a raw
//! artifact is trusted until [`is_valid_artifact`] has confirmed the shape
//! and [`ActivationContract::from_raw`] has narrowed it to the typed
//! contract. That narrowing is the single seam through which late-bound
//! code enters the host.

use crate::LoaderResult;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use trellis_types::{RemoteError, SurfaceHandle, VisibilityContext};

/// Outcome of a remote's own activation logic.
pub type ActivationResult = Result<(), trellis_types::error::ErrorCause>;

type ActivateFn = Arc<
    dyn Fn(SurfaceHandle, Arc<VisibilityContext>) -> BoxFuture<'static, ActivationResult>
        + Send
        + Sync,
>;
type DeactivateFn = Arc<dyn Fn(SurfaceHandle) + Send + Sync>;

/// One named export of a loaded artifact.
///
/// Mirrors the runtime-polymorphic value a dynamic load hands back: a
/// callable of one of the contract shapes, or plain data.
#[derive(Clone)]
pub enum Export {
    /// A callable with the activation shape.
    Activate(ActivateFn),
    /// A callable with the deactivation shape.
    Deactivate(DeactivateFn),
    /// A non-callable exported value.
    Value(serde_json::Value),
}

impl Export {
    /// Wrap an async activation function.
    pub fn activate<F, Fut>(f: F) -> Self
    where
        F: Fn(SurfaceHandle, Arc<VisibilityContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActivationResult> + Send + 'static,
    {
        Self::Activate(Arc::new(move |surface, context| {
            Box::pin(f(surface, context))
        }))
    }

    /// Wrap a deactivation function.
    pub fn deactivate<F>(f: F) -> Self
    where
        F: Fn(SurfaceHandle) + Send + Sync + 'static,
    {
        Self::Deactivate(Arc::new(f))
    }

    pub fn value(value: serde_json::Value) -> Self {
        Self::Value(value)
    }

    pub fn is_callable(&self) -> bool {
        !matches!(self, Export::Value(_))
    }
}

impl std::fmt::Debug for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Export::Activate(_) => f.write_str("Export::Activate(..)"),
            Export::Deactivate(_) => f.write_str("Export::Deactivate(..)"),
            Export::Value(v) => write!(f, "Export::Value({v})"),
        }
    }
}

/// The untrusted result of a dynamic load.
#[derive(Debug, Clone, Default)]
pub struct RawArtifact {
    exports: HashMap<String, Export>,
}

impl RawArtifact {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_export(mut self, name: impl Into<String>, export: Export) -> Self {
        self.exports.insert(name.into(), export);
        self
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }
}

/// Structural check applied immediately after a dynamic load, before any
/// export is invoked.
///
/// Valid iff an `activate` export exists and is callable, and a
/// `deactivate` export, when present, is callable too. No other shape
/// requirements.
pub fn is_valid_artifact(candidate: &RawArtifact) -> bool {
    let activate_ok = candidate
        .export("activate")
        .map(Export::is_callable)
        .unwrap_or(false);
    let deactivate_ok = candidate
        .export("deactivate")
        .map(Export::is_callable)
        .unwrap_or(true);
    activate_ok && deactivate_ok
}

/// The validated contract every remote must satisfy.
#[derive(Clone)]
pub struct ActivationContract {
    activate: ActivateFn,
    deactivate: Option<DeactivateFn>,
}

impl ActivationContract {
    /// Narrow a raw artifact to the typed contract.
    ///
    /// `None` when the artifact fails [`is_valid_artifact`] or an export
    /// carries the wrong callable shape.
    pub fn from_raw(raw: RawArtifact) -> Option<Self> {
        if !is_valid_artifact(&raw) {
            return None;
        }

        let activate = match raw.export("activate") {
            Some(Export::Activate(f)) => f.clone(),
            _ => return None,
        };
        let deactivate = match raw.export("deactivate") {
            None => None,
            Some(Export::Deactivate(f)) => Some(f.clone()),
            Some(_) => return None,
        };

        Some(Self {
            activate,
            deactivate,
        })
    }

    /// Invoke the remote's activation onto a surface with the cascaded
    /// context. A failure inside the remote surfaces as an activation-stage
    /// [`RemoteError`].
    pub async fn activate(
        &self,
        surface: SurfaceHandle,
        context: Arc<VisibilityContext>,
    ) -> LoaderResult<()> {
        (self.activate)(surface, context)
            .await
            .map_err(|cause| RemoteError::activation_with("Remote activation failed", cause))
    }

    /// Invoke the optional deactivation hook; a no-op when the remote did
    /// not export one.
    pub fn deactivate(&self, surface: SurfaceHandle) {
        if let Some(deactivate) = &self.deactivate {
            deactivate(surface);
        }
    }

    pub fn has_deactivate(&self) -> bool {
        self.deactivate.is_some()
    }
}

impl std::fmt::Debug for ActivationContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationContract")
            .field("has_deactivate", &self.deactivate.is_some())
            .finish()
    }
}

/// Late-bound code loading seam.
///
/// Returns the opaque artifact; callers must run it through
/// [`ActivationContract::from_raw`] before trusting any export.
#[async_trait]
pub trait ArtifactLoader: Send + Sync {
    async fn load(&self, address: &str) -> LoaderResult<RawArtifact>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_types::Surface;

    fn activate_export() -> Export {
        Export::activate(|_surface, _context| async { Ok(()) })
    }

    #[test]
    fn test_artifact_with_activate_is_valid() {
        let artifact = RawArtifact::new().with_export("activate", activate_export());
        assert!(is_valid_artifact(&artifact));
    }

    #[test]
    fn test_empty_artifact_is_invalid() {
        assert!(!is_valid_artifact(&RawArtifact::new()));
    }

    #[test]
    fn test_non_callable_activate_is_invalid() {
        let artifact =
            RawArtifact::new().with_export("activate", Export::value(json!("not a fn")));
        assert!(!is_valid_artifact(&artifact));
    }

    #[test]
    fn test_non_callable_deactivate_is_invalid() {
        let artifact = RawArtifact::new()
            .with_export("activate", activate_export())
            .with_export("deactivate", Export::value(json!("not a fn")));
        assert!(!is_valid_artifact(&artifact));
    }

    #[test]
    fn test_extra_exports_are_ignored() {
        let artifact = RawArtifact::new()
            .with_export("activate", activate_export())
            .with_export("metadata", Export::value(json!({ "version": 3 })));
        assert!(is_valid_artifact(&artifact));
        assert!(ActivationContract::from_raw(artifact).is_some());
    }

    #[tokio::test]
    async fn test_activation_failure_is_activation_stage() {
        let artifact = RawArtifact::new().with_export(
            "activate",
            Export::activate(|_surface, _context| async {
                let failure: ActivationResult = Err("render threw".into());
                failure
            }),
        );
        let contract = ActivationContract::from_raw(artifact).unwrap();

        let surface = Surface::root("slot");
        let context = Arc::new(test_context());
        let err = contract.activate(surface, context).await.unwrap_err();
        assert_eq!(err.stage(), trellis_types::ErrorStage::Activation);
    }

    #[test]
    fn test_contract_debug_elides_callables() {
        let contract = ActivationContract::from_raw(
            RawArtifact::new().with_export("activate", activate_export()),
        )
        .unwrap();

        let rendered = format!("{contract:?}");
        assert!(rendered.contains("ActivationContract"));
        assert!(rendered.contains("has_deactivate: false"));
    }

    #[test]
    fn test_deactivate_without_hook_is_noop() {
        let contract = ActivationContract::from_raw(
            RawArtifact::new().with_export("activate", activate_export()),
        )
        .unwrap();

        assert!(!contract.has_deactivate());
        contract.deactivate(Surface::root("slot"));
    }

    fn test_context() -> VisibilityContext {
        use trellis_types::{Environment, PortalContext, UserIdentity};
        VisibilityContext::derive(PortalContext::new(
            Environment::Development,
            UserIdentity::new("u-1", vec![]),
            "en-US",
        ))
    }
}
