//! Publisher: a dependent primitive attached to a node.
//!
//! A publisher keeps only a [`NodeRef`] to its node. Once the node is
//! finalized every operation fails with [`Error::NodeInvalid`]; if the node's
//! middleware binding was evicted by a newer node of the same name, the
//! middleware reports the failure instead.

use crate::error::{Error, Result};
use crate::middleware::EndpointId;
use crate::node::{NodeHandle, NodeRef};

/// A publisher on one topic of a node.
///
/// There is no `Drop` impl: call [`Publisher::fini`] to destroy the endpoint.
/// A publisher dropped without `fini` keeps its endpoint registered until the
/// node itself is finalized.
#[derive(Debug)]
pub struct Publisher {
    node: NodeRef,
    topic: String,
    endpoint: EndpointId,
}

impl Publisher {
    /// Create a publisher on `topic` for a valid node.
    pub fn new(node: &NodeHandle, topic: &str) -> Result<Self> {
        if topic.is_empty() {
            return Err(Error::InvalidArgument("topic name is empty".into()));
        }
        let node_ref = node.downgrade().ok_or(Error::NodeInvalid)?;
        let shared = node_ref.upgrade()?;
        let endpoint = shared.middleware.create_publisher(&shared.binding, topic)?;
        tracing::debug!(node = shared.binding.name(), topic, %endpoint, "publisher created");
        Ok(Self {
            node: node_ref,
            topic: topic.to_owned(),
            endpoint,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// True while the owning node is valid.
    pub fn is_valid(&self) -> bool {
        self.node.is_valid()
    }

    pub fn publish(&self, payload: &[u8]) -> Result<()> {
        let shared = self.node.upgrade()?;
        shared.middleware.publish(self.endpoint, payload)?;
        Ok(())
    }

    /// Destroy the publisher. Fails with `NodeInvalid` if the node is already gone.
    pub fn fini(self) -> Result<()> {
        let shared = self.node.upgrade()?;
        shared
            .middleware
            .destroy_publisher(&shared.binding, self.endpoint)?;
        tracing::debug!(node = shared.binding.name(), topic = %self.topic, "publisher destroyed");
        Ok(())
    }
}
