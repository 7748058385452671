//! Surface - the abstract mutable target remotes render into
//!
//! A surface stands in for a DOM node: a labeled tree node whose children
//! can be added and removed at runtime. Surfaces are identity-keyed
//! ([`SurfaceId`] is unique per node for the process lifetime) so registries
//! can associate state with a surface without owning it, via
//! [`std::sync::Weak`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a surface. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface:{}", self.0)
    }
}

/// Shared handle to a surface node.
pub type SurfaceHandle = Arc<Surface>;

/// A labeled node in the mutable render tree.
#[derive(Debug)]
pub struct Surface {
    id: SurfaceId,
    label: String,
    children: Mutex<Vec<SurfaceHandle>>,
}

impl Surface {
    /// Create a detached root surface.
    pub fn root(label: impl Into<String>) -> SurfaceHandle {
        Arc::new(Self {
            id: SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed)),
            label: label.into(),
            children: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Create and attach a child node.
    pub fn create_child(&self, label: impl Into<String>) -> SurfaceHandle {
        let child = Self::root(label);
        self.children
            .lock()
            .expect("surface children lock poisoned")
            .push(child.clone());
        child
    }

    /// Detach a child by identity. Returns whether it was attached.
    pub fn remove_child(&self, child: &SurfaceHandle) -> bool {
        let mut children = self
            .children
            .lock()
            .expect("surface children lock poisoned");
        let before = children.len();
        children.retain(|c| c.id != child.id);
        children.len() != before
    }

    pub fn child_count(&self) -> usize {
        self.children
            .lock()
            .expect("surface children lock poisoned")
            .len()
    }

    /// Snapshot of the current children.
    pub fn children(&self) -> Vec<SurfaceHandle> {
        self.children
            .lock()
            .expect("surface children lock poisoned")
            .clone()
    }

    /// Whether any child carries the given label.
    pub fn has_child_labeled(&self, label: &str) -> bool {
        self.children
            .lock()
            .expect("surface children lock poisoned")
            .iter()
            .any(|c| c.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Surface::root("a");
        let b = Surface::root("b");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_child_attach_and_detach() {
        let root = Surface::root("root");
        let child = root.create_child("slot");

        assert_eq!(root.child_count(), 1);
        assert!(root.has_child_labeled("slot"));

        assert!(root.remove_child(&child));
        assert_eq!(root.child_count(), 0);
        // Second removal is a no-op.
        assert!(!root.remove_child(&child));
    }

    #[test]
    fn test_weak_handles_do_not_keep_surfaces_alive() {
        let root = Surface::root("root");
        let child = root.create_child("slot");
        let weak = Arc::downgrade(&child);

        root.remove_child(&child);
        drop(child);

        assert!(weak.upgrade().is_none());
    }
}
