//! Parameter infrastructure auto-created for a node.
//!
//! One publisher on [`PARAMETER_EVENTS_TOPIC`] and one service per entry of
//! [`PARAMETER_SERVICES`], all bound to the node's middleware binding. The
//! node owns these endpoints; they are destroyed in reverse creation order
//! before the binding itself.

use std::mem;

use crate::allocator::{Allocator, Block};
use crate::error::{Error, Result};
use crate::middleware::{EndpointId, Middleware, NodeBinding};

/// Topic the parameter event publisher is created on.
pub const PARAMETER_EVENTS_TOPIC: &str = "/parameter_events";

/// Services created under `/<node name>/`, in creation order.
pub const PARAMETER_SERVICES: [&str; 6] = [
    "describe_parameters",
    "get_parameters",
    "get_parameter_types",
    "list_parameters",
    "set_parameters",
    "set_parameters_atomically",
];

const TABLE_INITIAL_CAPACITY: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EndpointKind {
    Publisher,
    Service,
}

/// One endpoint owned by the parameter infrastructure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterEndpoint {
    kind: EndpointKind,
    name: String,
    id: EndpointId,
}

impl ParameterEndpoint {
    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }
}

/// Full endpoint plan for a node, in creation order.
pub fn parameter_endpoint_plan(node_name: &str) -> Vec<(EndpointKind, String)> {
    std::iter::once((EndpointKind::Publisher, PARAMETER_EVENTS_TOPIC.to_string()))
        .chain(
            PARAMETER_SERVICES
                .iter()
                .map(|service| (EndpointKind::Service, format!("/{node_name}/{service}"))),
        )
        .collect()
}

/// Endpoints created for one node, plus the allocator block backing the table.
#[derive(Debug, Default)]
pub(crate) struct ParameterInfrastructure {
    endpoints: Vec<ParameterEndpoint>,
    table: Option<Block>,
}

impl ParameterInfrastructure {
    /// Create every endpoint of the plan, stopping at the first failure.
    ///
    /// Whatever was created before the failure is kept (and later torn down);
    /// the failure itself is returned alongside.
    pub(crate) fn create(
        middleware: &dyn Middleware,
        node: &NodeBinding,
        allocator: &Allocator,
    ) -> (Self, Option<Error>) {
        let mut infra = Self::default();
        let outcome = infra.populate(middleware, node, allocator);
        (infra, outcome.err())
    }

    fn populate(
        &mut self,
        middleware: &dyn Middleware,
        node: &NodeBinding,
        allocator: &Allocator,
    ) -> Result<()> {
        for (kind, name) in parameter_endpoint_plan(node.name()) {
            self.reserve_slot(allocator)?;
            let id = match kind {
                EndpointKind::Publisher => middleware.create_publisher(node, &name)?,
                EndpointKind::Service => middleware.create_service(node, &name)?,
            };
            tracing::trace!(node = node.name(), endpoint = %name, %id, "parameter endpoint created");
            self.endpoints.push(ParameterEndpoint { kind, name, id });
        }
        Ok(())
    }

    /// Make room for one more entry, growing the table by doubling.
    fn reserve_slot(&mut self, allocator: &Allocator) -> Result<()> {
        let entry = mem::size_of::<ParameterEndpoint>();
        let needed = (self.endpoints.len() + 1) * entry;
        if let Some(block) = self.table.as_mut() {
            if block.size() < needed {
                block.reallocate(block.size() * 2)?;
            }
        } else {
            self.table = Some(allocator.allocate(TABLE_INITIAL_CAPACITY * entry)?);
        }
        Ok(())
    }

    pub(crate) fn endpoints(&self) -> &[ParameterEndpoint] {
        &self.endpoints
    }

    /// Destroy every endpoint in reverse order. Failures are collected, never
    /// short-circuited.
    pub(crate) fn teardown(self, middleware: &dyn Middleware, node: &NodeBinding) -> Vec<Error> {
        let Self { endpoints, table } = self;
        let mut errors = Vec::new();
        for endpoint in endpoints.into_iter().rev() {
            let result = match endpoint.kind {
                EndpointKind::Publisher => middleware.destroy_publisher(node, endpoint.id),
                EndpointKind::Service => middleware.destroy_service(node, endpoint.id),
            };
            if let Err(err) = result {
                tracing::warn!(node = node.name(), endpoint = %endpoint.name, error = %err, "failed to destroy parameter endpoint");
                errors.push(err.into());
            }
        }
        drop(table);
        errors
    }
}
