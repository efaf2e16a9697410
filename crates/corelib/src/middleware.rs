//! Boundary with the middleware abstraction layer.
//!
//! The core never talks to a transport directly. It asks a [`Middleware`]
//! implementation to create and destroy node bindings and endpoints, and hands
//! the resulting [`NodeBinding`] to dependent primitives.
//!
//! Name uniqueness is the middleware's business: `create_node` with a name
//! already registered in the domain shuts the existing node down and succeeds.

use std::fmt;
use std::sync::Arc;

/// Identifier of a node binding inside its middleware domain.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BindingId(pub u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Identifier of a publisher or service endpoint.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EndpointId(pub u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint#{}", self.0)
    }
}

/// Errors reported by the middleware layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MiddlewareError {
    /// The node was shut down (finalized, or evicted by a newer node of the same name).
    #[error("node '{name}' has been shut down")]
    NodeShutdown { name: String },
    #[error("unknown node binding {0}")]
    UnknownNode(BindingId),
    #[error("unknown endpoint {0}")]
    UnknownEndpoint(EndpointId),
    /// Failure injected by a test harness.
    #[error("injected failure in {operation}")]
    Injected { operation: &'static str },
    #[error("{0}")]
    Backend(String),
}

/// The middleware layer's own object representing a node.
pub trait MiddlewareNode: Send + Sync + fmt::Debug {
    fn id(&self) -> BindingId;

    /// The name the node was registered under.
    fn name(&self) -> &str;

    /// False once the node was destroyed or evicted from the domain.
    fn is_alive(&self) -> bool;
}

/// Shared reference to a middleware node object.
pub type NodeBinding = Arc<dyn MiddlewareNode>;

/// Operations the core consumes from the middleware layer.
///
/// Every method is a direct synchronous call; implementations own their
/// concurrency guarantees (notably around the domain-wide name registry).
pub trait Middleware: Send + Sync + 'static {
    /// Register a node in the domain. A colliding node is shut down.
    fn create_node(&self, name: &str) -> Result<NodeBinding, MiddlewareError>;

    /// Unregister a node. Expected to be idempotent.
    fn destroy_node(&self, node: &NodeBinding) -> Result<(), MiddlewareError>;

    fn create_publisher(&self, node: &NodeBinding, topic: &str) -> Result<EndpointId, MiddlewareError>;

    fn destroy_publisher(&self, node: &NodeBinding, publisher: EndpointId) -> Result<(), MiddlewareError>;

    fn publish(&self, publisher: EndpointId, payload: &[u8]) -> Result<(), MiddlewareError>;

    fn create_service(&self, node: &NodeBinding, service: &str) -> Result<EndpointId, MiddlewareError>;

    fn destroy_service(&self, node: &NodeBinding, service: EndpointId) -> Result<(), MiddlewareError>;

    /// Implementation name (for logging/debugging).
    fn name(&self) -> &'static str;
}
