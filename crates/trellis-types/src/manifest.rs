//! Remote manifest - the name → variant → address lookup table
//!
//! The manifest is fetched once per process and memoized by the address
//! book; it is never mutated after a successful load. Unknown top-level
//! keys are ignored so the wire format can grow without breaking older
//! hosts.

use crate::error::RemoteError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The variant used when the requested one is absent.
pub const DEFAULT_VARIANT: &str = "current";

/// Addresses for one remote, keyed by variant tag ("current", "next", ...).
pub type VariantAddresses = HashMap<String, String>;

/// Mapping from remote name to its address variants.
///
/// Wire format:
///
/// ```json
/// { "remotes": { "status": { "current": "http://h/status.mjs" } } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteManifest {
    pub remotes: HashMap<String, VariantAddresses>,
}

impl RemoteManifest {
    pub fn new(remotes: HashMap<String, VariantAddresses>) -> Self {
        Self { remotes }
    }

    /// Structural validation applied after every fetch or embed.
    ///
    /// Every remote entry must carry at least one variant and every address
    /// must be non-empty.
    pub fn validate(&self) -> Result<(), RemoteError> {
        for (name, variants) in &self.remotes {
            if variants.is_empty() {
                return Err(RemoteError::manifest(format!(
                    "Remote \"{name}\" has no address variants"
                )));
            }
            for (variant, address) in variants {
                if address.trim().is_empty() {
                    return Err(RemoteError::manifest(format!(
                        "Remote \"{name}\" has an empty address for variant \"{variant}\""
                    )));
                }
            }
        }
        Ok(())
    }

    /// Address for `name`, preferring `variant` and falling back to the
    /// default variant when the requested one is absent.
    ///
    /// Fails explicitly when the remote is unknown, or when neither the
    /// requested variant nor the default exists.
    pub fn address_for(&self, name: &str, variant: Option<&str>) -> Result<&str, RemoteError> {
        let variants = self
            .remotes
            .get(name)
            .ok_or_else(|| RemoteError::manifest(format!("Unknown remote \"{name}\"")))?;

        let requested = variant.unwrap_or(DEFAULT_VARIANT);
        variants
            .get(requested)
            .or_else(|| variants.get(DEFAULT_VARIANT))
            .map(String::as_str)
            .ok_or_else(|| {
                RemoteError::manifest(format!(
                    "No address for variant \"{requested}\" of remote \"{name}\""
                ))
            })
    }
}
