//! Stylesheet co-loading - derivation and idempotent injection
//!
//! Every remote ships a stylesheet next to its code bundle; its address is
//! derived from the code address by swapping the extension. Loading is
//! best-effort: a stylesheet failure is logged and never blocks code
//! activation.

use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::Arc;
use tracing::debug;
use trellis_types::StylesheetError;
use url::Url;

/// Code extensions recognized for derivation, tried in order.
const CODE_EXTENSIONS: [&str; 2] = [".mjs", ".js"];
const STYLESHEET_EXTENSION: &str = ".css";

/// Options for [`derive_stylesheet_address`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeriveOptions {
    /// Drop a trailing `-<alnum-token>` (a content hash) immediately before
    /// the extension, so `visibility-abc123.mjs` maps to `visibility.css`.
    pub strip_variant_suffix: bool,
}

/// Derive the stylesheet address matching a code-module address.
///
/// Replaces a recognized code extension with `.css`, preserving any query
/// and fragment verbatim. Addresses that parse as URLs are rewritten on
/// their path component; anything else (relative addresses) falls back to
/// plain substring substitution. Never panics; unrecognized addresses are
/// returned unchanged.
pub fn derive_stylesheet_address(code_address: &str, options: DeriveOptions) -> String {
    if let Ok(mut url) = Url::parse(code_address) {
        let path = url.path().to_string();
        if let Some(rewritten) = rewrite_file_path(&path, options) {
            url.set_path(&rewritten);
            return url.to_string();
        }
        return code_address.to_string();
    }

    // Relative address: split query/fragment off by hand and substitute.
    let suffix_start = code_address
        .find(['?', '#'])
        .unwrap_or(code_address.len());
    let (path, suffix) = code_address.split_at(suffix_start);
    match rewrite_file_path(path, options) {
        Some(rewritten) => format!("{rewritten}{suffix}"),
        None => code_address.to_string(),
    }
}

/// Swap a recognized code extension for the stylesheet extension, optionally
/// stripping a `-<alnum>` token before it. `None` when no extension matches.
fn rewrite_file_path(path: &str, options: DeriveOptions) -> Option<String> {
    for extension in CODE_EXTENSIONS {
        if let Some(stem) = path.strip_suffix(extension) {
            let stem = if options.strip_variant_suffix {
                strip_variant_token(stem)
            } else {
                stem
            };
            return Some(format!("{stem}{STYLESHEET_EXTENSION}"));
        }
    }
    None
}

/// Remove a trailing `-<one-or-more-alphanumerics>` segment, if present.
fn strip_variant_token(stem: &str) -> &str {
    match stem.rfind('-') {
        Some(pos) => {
            let token = &stem[pos + 1..];
            if !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric()) {
                &stem[..pos]
            } else {
                stem
            }
        }
        None => stem,
    }
}

/// Injection seam: the one capability a concrete surface must provide.
#[async_trait]
pub trait StylesheetSink: Send + Sync {
    /// Inject a stylesheet-link resource for `address`. Called at most once
    /// per distinct address by the co-loader.
    async fn inject(&self, address: &str) -> Result<(), StylesheetError>;
}

/// Idempotent stylesheet loader.
///
/// Holds the loaded-address set as explicit instance state; one instance is
/// shared process-wide through the fetcher rather than living in a module
/// global.
pub struct StylesheetCoLoader {
    sink: Arc<dyn StylesheetSink>,
    loaded: DashSet<String>,
}

impl StylesheetCoLoader {
    pub fn new(sink: Arc<dyn StylesheetSink>) -> Self {
        Self {
            sink,
            loaded: DashSet::new(),
        }
    }

    /// Ensure exactly one stylesheet resource exists for `address`.
    ///
    /// An address already loaded (by string equality) resolves immediately.
    /// On sink failure the address is forgotten again so a later attempt can
    /// retry, and the error is returned for the caller to log; it must never
    /// gate code loading.
    pub async fn load(&self, address: &str) -> Result<(), StylesheetError> {
        if !self.loaded.insert(address.to_string()) {
            debug!(address, "Stylesheet already loaded; skipping");
            return Ok(());
        }

        match self.sink.inject(address).await {
            Ok(()) => {
                debug!(address, "Stylesheet loaded");
                Ok(())
            }
            Err(err) => {
                self.loaded.remove(address);
                Err(err)
            }
        }
    }

    /// Whether an address has been successfully loaded.
    pub fn is_loaded(&self, address: &str) -> bool {
        self.loaded.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordingStylesheetSink;

    fn derive(address: &str) -> String {
        derive_stylesheet_address(address, DeriveOptions::default())
    }

    fn derive_stripped(address: &str) -> String {
        derive_stylesheet_address(
            address,
            DeriveOptions {
                strip_variant_suffix: true,
            },
        )
    }

    #[test]
    fn test_derivation_default_mode() {
        assert_eq!(derive("http://h/mount.mjs"), "http://h/mount.css");
        assert_eq!(derive("http://h/bundle.js"), "http://h/bundle.css");
        assert_eq!(derive("http://h/mount.mjs?v=123"), "http://h/mount.css?v=123");
        assert_eq!(derive("./mount.mjs"), "./mount.css");
    }

    #[test]
    fn test_derivation_preserves_fragment() {
        assert_eq!(
            derive("http://h/mount.mjs?v=1#top"),
            "http://h/mount.css?v=1#top"
        );
        assert_eq!(derive("assets/mount.js#frag"), "assets/mount.css#frag");
    }

    #[test]
    fn test_derivation_hash_stripping_mode() {
        assert_eq!(
            derive_stripped("http://h/visibility-abc123.mjs"),
            "http://h/visibility.css"
        );
        // Absent suffix is unaffected.
        assert_eq!(
            derive_stripped("http://h/visibility.mjs"),
            "http://h/visibility.css"
        );
    }

    #[test]
    fn test_derivation_leaves_unrecognized_addresses_alone() {
        assert_eq!(derive("http://h/mount.wasm"), "http://h/mount.wasm");
        assert_eq!(derive("not a url at all"), "not a url at all");
    }

    #[test]
    fn test_strip_requires_alphanumeric_token() {
        // "-v1.2" before the extension is not a plain alnum token.
        assert_eq!(
            derive_stripped("http://h/widget-v1.2.js"),
            "http://h/widget-v1.2.css"
        );
    }

    #[tokio::test]
    async fn test_load_is_idempotent_per_address() {
        let sink = Arc::new(RecordingStylesheetSink::new());
        let loader = StylesheetCoLoader::new(sink.clone());

        loader.load("http://h/status.css").await.unwrap();
        loader.load("http://h/status.css").await.unwrap();
        loader.load("http://h/other.css").await.unwrap();

        assert_eq!(
            sink.injected(),
            vec![
                "http://h/status.css".to_string(),
                "http://h/other.css".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_load_failure_names_address_and_allows_retry() {
        let sink = Arc::new(RecordingStylesheetSink::new());
        sink.fail_address("http://h/broken.css");
        let loader = StylesheetCoLoader::new(sink.clone());

        let err = loader.load("http://h/broken.css").await.unwrap_err();
        assert!(err.to_string().contains("http://h/broken.css"));
        assert!(!loader.is_loaded("http://h/broken.css"));

        // The failure did not poison the loaded set.
        sink.clear_failures();
        loader.load("http://h/broken.css").await.unwrap();
        assert!(loader.is_loaded("http://h/broken.css"));
    }
}
