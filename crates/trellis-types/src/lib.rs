//! Trellis Types - Shared types for the remote activation runtime
//!
//! This crate defines the vocabulary shared by the loader and runtime layers:
//!
//! - **Context cascade**: [`PortalContext`] (base layer) and
//!   [`VisibilityContext`] (derived layer), the strictly-additive
//!   configuration record that flows host → shell → remote and never back up
//! - **Manifest**: [`RemoteManifest`], the name → variant → address lookup
//!   table for remotes
//! - **Errors**: [`RemoteError`], tagged by the stage at which a remote
//!   failed, plus the always-non-fatal [`StylesheetError`]
//! - **Surfaces**: [`Surface`], the abstract mutable tree remotes render into

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod context;
pub mod error;
pub mod manifest;
pub mod surface;

// Re-exports
pub use context::{Environment, PortalContext, UserIdentity, VisibilityContext};
pub use error::{ErrorStage, RemoteError, StylesheetError};
pub use manifest::{RemoteManifest, DEFAULT_VARIANT};
pub use surface::{Surface, SurfaceHandle, SurfaceId};
