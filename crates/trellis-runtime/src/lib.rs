//! Trellis Runtime - Activation lifecycle against mutable surfaces
//!
//! The presentation-facing half of the system:
//!
//! - **RootRegistry**: surface-keyed, non-owning association of live render
//!   handles, guaranteeing at most one handle per surface and in-place
//!   re-rendering on re-activation
//! - **ActivationSlot**: owns one target surface, drives resolution and
//!   resilient loading, invokes the validated contract, tracks
//!   loading/mounted/error state, and guarantees deactivation on teardown
//! - **SurfaceStylesheetSink**: stylesheet injection into a head surface,
//!   plugged into the loader's co-load seam
//!
//! Failures never cross the slot boundary as panics or errors; they become
//! observable [`SlotState::Error`] values so one remote's failure cannot
//! affect sibling slots.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod registry;
pub mod slot;
pub mod styles;

// Re-exports
pub use registry::{RenderRoot, RootRegistry};
pub use slot::{ActivationSlot, SlotState};
pub use styles::SurfaceStylesheetSink;
