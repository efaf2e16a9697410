//! Core library for node lifecycle management.
//!
//! This crate provides the node abstraction that middleware primitives attach to:
//! - Allocator capability injected into every node
//! - Node options and their defaults
//! - Node name validation
//! - The middleware collaborator boundary
//! - Node handle lifecycle (init / fini / accessors)
//! - Auto-created parameter infrastructure
//! - Dependent primitives holding non-owning node references

pub mod allocator;
pub mod error;
pub mod middleware;
pub mod name;
pub mod node;
pub mod options;
pub mod parameter;
pub mod publisher;

pub use allocator::{AllocError, Allocator, AllocatorBackend, Block, BlockId, SystemAllocator};
pub use error::{Error, Result};
pub use middleware::{BindingId, EndpointId, Middleware, MiddlewareError, MiddlewareNode, NodeBinding};
pub use name::{validate_node_name, NameError, MAX_NODE_NAME_LEN};
pub use node::{InitOutcome, NodeHandle, NodeRef};
pub use options::{default_options, NodeOptions, NodeOptionsConfig};
pub use parameter::{parameter_endpoint_plan, EndpointKind, ParameterEndpoint, PARAMETER_EVENTS_TOPIC, PARAMETER_SERVICES};
pub use publisher::Publisher;
