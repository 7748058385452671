//! Root registry - surface-keyed render handles
//!
//! Maps each surface to its currently-active render handle so that
//! re-activating a surface re-renders in place instead of mounting a
//! duplicate. Records hold the surface weakly: the registry never extends a
//! surface's lifetime, and records whose surface has been discarded are
//! purged deterministically on the next touch.

use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};
use trellis_types::{Surface, SurfaceHandle, SurfaceId, VisibilityContext};

/// A live rendering bound to exactly one surface.
pub trait RenderRoot: Send + Sync {
    /// Render (or re-render) with the given cascaded context.
    fn render(&self, context: Arc<VisibilityContext>);

    /// Destroy the rendering and release its resources.
    fn unmount(&self);
}

struct MountRecord {
    surface: Weak<Surface>,
    root: Arc<dyn RenderRoot>,
}

/// Registry of live render handles, at most one per surface.
pub struct RootRegistry {
    mounts: DashMap<SurfaceId, MountRecord>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self {
            mounts: DashMap::new(),
        }
    }

    /// Render onto `surface`, creating a handle only if none is live.
    ///
    /// A surface with a recorded live handle is re-rendered in place with
    /// the new context; otherwise `create` builds the handle, which is
    /// rendered once and recorded.
    pub fn activate_or_reactivate<F>(
        &self,
        surface: &SurfaceHandle,
        context: Arc<VisibilityContext>,
        create: F,
    ) -> Arc<dyn RenderRoot>
    where
        F: FnOnce(SurfaceHandle) -> Arc<dyn RenderRoot>,
    {
        self.purge_dropped();

        if let Some(record) = self.mounts.get(&surface.id()) {
            debug!(surface = %surface.id(), "Re-rendering existing root in place");
            let root = record.root.clone();
            drop(record);
            root.render(context);
            return root;
        }

        let root = create(surface.clone());
        self.mounts.insert(
            surface.id(),
            MountRecord {
                surface: Arc::downgrade(surface),
                root: root.clone(),
            },
        );
        debug!(surface = %surface.id(), "Created render root");
        root.render(context);
        root
    }

    /// Unmount and forget the handle for `surface`, if any.
    ///
    /// Passing `None` is a logged no-op, never a crash; so is deactivating
    /// a surface with no recorded handle.
    pub fn deactivate(&self, surface: Option<&SurfaceHandle>) {
        let Some(surface) = surface else {
            warn!("Deactivate called without a surface; ignoring");
            return;
        };

        if let Some((_, record)) = self.mounts.remove(&surface.id()) {
            record.root.unmount();
            debug!(surface = %surface.id(), "Render root unmounted");
        }
    }

    /// Whether `surface` currently has a live handle.
    pub fn has_mount(&self, surface: &SurfaceHandle) -> bool {
        self.mounts
            .get(&surface.id())
            .map(|r| r.surface.upgrade().is_some())
            .unwrap_or(false)
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// Drop records whose surface has been discarded.
    fn purge_dropped(&self) {
        self.mounts.retain(|_, record| record.surface.upgrade().is_some());
    }
}

impl Default for RootRegistry {
    fn default() -> Self {
        Self::new()
    }
}
