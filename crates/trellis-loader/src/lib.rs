//! Trellis Loader - Remote resolution and loading
//!
//! This crate turns a remote name into a validated activation contract:
//!
//! - **AddressBook**: fetches the manifest once, memoizes it, and resolves
//!   name + variant to an address
//! - **StylesheetCoLoader**: derives the stylesheet address from a code
//!   address and injects it idempotently, best-effort
//! - **ContractValidator**: narrows an opaque loaded artifact to the typed
//!   activation contract
//! - **RemoteFetcher**: one resolution + co-load + load + validation attempt
//! - **ResilientLoader**: bounded retry with exponential backoff and a
//!   per-attempt timeout around the fetcher
//!
//! ## Seams
//!
//! The three runtime-specific capabilities are traits so the control flow
//! tests without a browser: [`ManifestSource`] (manifest transport),
//! [`StylesheetSink`] (link-tag injection), and [`ArtifactLoader`]
//! (late-bound code loading). In-memory implementations suitable for tests
//! and embedding live in [`memory`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

use trellis_types::RemoteError;

/// Result alias for remote resolution and loading operations.
pub type LoaderResult<T> = std::result::Result<T, RemoteError>;

pub mod address_book;
pub mod contract;
pub mod fetcher;
pub mod memory;
pub mod resilient;
pub mod stylesheet;

// Re-exports
pub use address_book::{AddressBook, HttpManifestSource, ManifestSource};
pub use contract::{
    is_valid_artifact, ActivationContract, ActivationResult, ArtifactLoader, Export, RawArtifact,
};
pub use fetcher::RemoteFetcher;
pub use memory::{
    InMemoryArtifactLoader, InMemoryManifestSource, PendingArtifactLoader,
    RecordingStylesheetSink,
};
pub use resilient::{ResilientLoader, RetryPolicy};
pub use stylesheet::{
    derive_stylesheet_address, DeriveOptions, StylesheetCoLoader, StylesheetSink,
};
