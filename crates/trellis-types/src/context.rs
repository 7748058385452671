//! Context cascade - the layered configuration record
//!
//! A [`PortalContext`] is the base layer supplied by the host at process
//! start. A [`VisibilityContext`] derives from it by embedding the base and
//! adding entitlements, a rollout-variant selector, and optional feature
//! flags. Derivation is strictly additive: the derived layer exposes every
//! inherited field unchanged and no API mutates a field after construction.
//!
//! Contexts flow strictly downward (host → shell → remote), normally as
//! `Arc<VisibilityContext>`. Remotes read through the accessors and have no
//! way to write back.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Deployment environment tag carried by the base context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Whether full error details may be shown to the user.
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// The authenticated user the portal is rendering for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    id: String,
    roles: Vec<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Base context layer, supplied by the host at process start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalContext {
    environment: Environment,
    user: UserIdentity,
    locale: String,
    /// Open extension slot for host-specific additions. Additive only.
    #[serde(default)]
    extensions: BTreeMap<String, serde_json::Value>,
}

impl PortalContext {
    pub fn new(environment: Environment, user: UserIdentity, locale: impl Into<String>) -> Self {
        Self {
            environment,
            user,
            locale: locale.into(),
            extensions: BTreeMap::new(),
        }
    }

    /// Add an extension entry. Consumes and returns the context so
    /// construction stays additive; there is no in-place setter.
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.extensions.get(key)
    }

    pub fn extensions(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extensions
    }
}

/// Derived context layer handed to every remote activation.
///
/// Structural superset of [`PortalContext`]: the base is embedded whole and
/// readable unchanged through the same accessors, plus entitlements, the
/// rollout-variant selector used for address resolution, and optional
/// feature flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityContext {
    portal: PortalContext,
    entitlements: BTreeSet<String>,
    rollout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_flags: Option<BTreeMap<String, bool>>,
}

impl VisibilityContext {
    /// Derive the visibility layer from a base context.
    ///
    /// `rollout` defaults to the manifest's default variant; override with
    /// [`with_rollout`](Self::with_rollout).
    pub fn derive(portal: PortalContext) -> Self {
        Self {
            portal,
            entitlements: BTreeSet::new(),
            rollout: crate::manifest::DEFAULT_VARIANT.to_string(),
            feature_flags: None,
        }
    }

    pub fn with_entitlement(mut self, entitlement: impl Into<String>) -> Self {
        self.entitlements.insert(entitlement.into());
        self
    }

    pub fn with_rollout(mut self, rollout: impl Into<String>) -> Self {
        self.rollout = rollout.into();
        self
    }

    pub fn with_feature_flag(mut self, flag: impl Into<String>, enabled: bool) -> Self {
        self.feature_flags
            .get_or_insert_with(BTreeMap::new)
            .insert(flag.into(), enabled);
        self
    }

    /// The embedded base layer.
    pub fn portal(&self) -> &PortalContext {
        &self.portal
    }

    // Inherited accessors - the base layer read through unchanged.

    pub fn environment(&self) -> Environment {
        self.portal.environment()
    }

    pub fn user(&self) -> &UserIdentity {
        self.portal.user()
    }

    pub fn locale(&self) -> &str {
        self.portal.locale()
    }

    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.portal.extension(key)
    }

    // Derived-layer additions.

    pub fn entitlements(&self) -> &BTreeSet<String> {
        &self.entitlements
    }

    pub fn has_entitlement(&self, entitlement: &str) -> bool {
        self.entitlements.contains(entitlement)
    }

    /// The rollout-variant selector used when resolving remote addresses.
    pub fn rollout(&self) -> &str {
        &self.rollout
    }

    pub fn feature_flag(&self, flag: &str) -> Option<bool> {
        self.feature_flags.as_ref().and_then(|f| f.get(flag)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> PortalContext {
        PortalContext::new(
            Environment::Production,
            UserIdentity::new("u-1", vec!["viewer".to_string()]),
            "en-US",
        )
        .with_extension("tenant", json!("acme"))
    }

    #[test]
    fn test_derived_layer_is_structural_superset() {
        let portal = base();
        let derived = VisibilityContext::derive(portal.clone())
            .with_entitlement("billing")
            .with_rollout("next")
            .with_feature_flag("dark-mode", true);

        // Every inherited field reads back unchanged.
        assert_eq!(derived.environment(), portal.environment());
        assert_eq!(derived.user(), portal.user());
        assert_eq!(derived.locale(), portal.locale());
        assert_eq!(derived.extension("tenant"), portal.extension("tenant"));
        assert_eq!(derived.portal(), &portal);

        // Plus its own additions.
        assert!(derived.has_entitlement("billing"));
        assert_eq!(derived.rollout(), "next");
        assert_eq!(derived.feature_flag("dark-mode"), Some(true));
    }

    #[test]
    fn test_no_upstream_mutation_through_clones() {
        let portal = base();
        let derived = VisibilityContext::derive(portal.clone());

        // A downstream copy cannot reach back: extending a clone leaves the
        // original layers untouched.
        let downstream = derived.clone().with_entitlement("admin");
        assert!(downstream.has_entitlement("admin"));
        assert!(!derived.has_entitlement("admin"));
        assert_eq!(derived.portal(), &portal);
    }

    #[test]
    fn test_rollout_defaults_to_current() {
        let derived = VisibilityContext::derive(base());
        assert_eq!(derived.rollout(), "current");
    }

    #[test]
    fn test_context_serializes_with_base_embedded() {
        let derived = VisibilityContext::derive(base()).with_entitlement("billing");
        let value = serde_json::to_value(&derived).unwrap();

        assert_eq!(value["portal"]["environment"], json!("production"));
        assert_eq!(value["portal"]["locale"], json!("en-US"));
        assert_eq!(value["entitlements"], json!(["billing"]));
    }
}
