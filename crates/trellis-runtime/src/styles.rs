//! Stylesheet injection into a head surface
//!
//! The concrete implementation of the loader's [`StylesheetSink`] seam:
//! each injected stylesheet becomes a labeled child of the host's head
//! surface, the way a link tag lands in a document head. Idempotence is the
//! co-loader's job; the sink only injects.

use async_trait::async_trait;
use trellis_loader::StylesheetSink;
use trellis_types::{StylesheetError, SurfaceHandle};

/// Sink appending stylesheet nodes to a head surface.
pub struct SurfaceStylesheetSink {
    head: SurfaceHandle,
}

impl SurfaceStylesheetSink {
    pub fn new(head: SurfaceHandle) -> Self {
        Self { head }
    }

    /// Label given to the node injected for `address`.
    pub fn link_label(address: &str) -> String {
        format!("stylesheet:{address}")
    }
}

#[async_trait]
impl StylesheetSink for SurfaceStylesheetSink {
    async fn inject(&self, address: &str) -> Result<(), StylesheetError> {
        self.head.create_child(Self::link_label(address));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trellis_loader::StylesheetCoLoader;
    use trellis_types::Surface;

    #[tokio::test]
    async fn test_injects_one_link_node_per_address() {
        let head = Surface::root("head");
        let loader = StylesheetCoLoader::new(Arc::new(SurfaceStylesheetSink::new(head.clone())));

        loader.load("http://h/status.css").await.unwrap();
        loader.load("http://h/status.css").await.unwrap();

        assert_eq!(head.child_count(), 1);
        assert!(head.has_child_labeled("stylesheet:http://h/status.css"));
    }
}
