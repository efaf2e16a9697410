//! In-process middleware domain.
//!
//! A single [`InProcessDomain`] is one naming scope. Nodes registered under an
//! existing name evict the previous holder (last registrant wins): the old
//! binding stops reporting alive and its endpoints are removed from the
//! domain. Traffic on a removed endpoint reports the shutdown; destroying it
//! from the evicted binding is a no-op.
//!
//! Every call is appended to a journal so tests can assert exactly what the
//! core asked for, and any operation can be made to fail on demand.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use corelib::{
    BindingId, EndpointId, EndpointKind, Middleware, MiddlewareError, MiddlewareNode, NodeBinding,
};
use dashmap::DashMap;
use parking_lot::Mutex;

/// Middleware operation, for journal filtering and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateNode,
    DestroyNode,
    CreatePublisher,
    DestroyPublisher,
    Publish,
    CreateService,
    DestroyService,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateNode => "create_node",
            Operation::DestroyNode => "destroy_node",
            Operation::CreatePublisher => "create_publisher",
            Operation::DestroyPublisher => "destroy_publisher",
            Operation::Publish => "publish",
            Operation::CreateService => "create_service",
            Operation::DestroyService => "destroy_service",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One journaled middleware call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateNode { name: String },
    DestroyNode { name: String },
    CreatePublisher { node: String, topic: String },
    DestroyPublisher { node: String, endpoint: EndpointId },
    Publish { endpoint: EndpointId, len: usize },
    CreateService { node: String, service: String },
    DestroyService { node: String, endpoint: EndpointId },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::CreateNode { .. } => Operation::CreateNode,
            Call::DestroyNode { .. } => Operation::DestroyNode,
            Call::CreatePublisher { .. } => Operation::CreatePublisher,
            Call::DestroyPublisher { .. } => Operation::DestroyPublisher,
            Call::Publish { .. } => Operation::Publish,
            Call::CreateService { .. } => Operation::CreateService,
            Call::DestroyService { .. } => Operation::DestroyService,
        }
    }
}

/// Node object handed out by the domain.
#[derive(Debug)]
pub struct InProcNode {
    id: BindingId,
    name: String,
    alive: AtomicBool,
}

impl InProcNode {
    fn shut_down(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl MiddlewareNode for InProcNode {
    fn id(&self) -> BindingId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
struct Endpoint {
    kind: EndpointKind,
    name: String,
    owner: Arc<InProcNode>,
}

#[derive(Debug)]
struct Fault {
    operation: Operation,
    skip: usize,
}

/// A naming scope with its registry, endpoints and published messages.
#[derive(Debug, Default)]
pub struct InProcessDomain {
    names: DashMap<String, Arc<InProcNode>>,
    endpoints: DashMap<EndpointId, Endpoint>,
    /// Endpoints removed by eviction, kept until their owner tears them down.
    retired: DashMap<EndpointId, Endpoint>,
    messages: DashMap<String, Vec<Vec<u8>>>,
    next_id: AtomicU64,
    journal: Mutex<Vec<Call>>,
    faults: Mutex<Vec<Fault>>,
}

impl InProcessDomain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// This domain as the trait object nodes are initialized with.
    pub fn as_middleware(self: &Arc<Self>) -> Arc<dyn Middleware> {
        Arc::clone(self) as Arc<dyn Middleware>
    }

    /// Fail the next call of `operation`.
    pub fn inject_failure(&self, operation: Operation) {
        self.inject_failure_after(operation, 0);
    }

    /// Let `skip` calls of `operation` through, then fail the next one.
    pub fn inject_failure_after(&self, operation: Operation, skip: usize) {
        self.faults.lock().push(Fault { operation, skip });
    }

    /// Snapshot of the call journal.
    pub fn calls(&self) -> Vec<Call> {
        self.journal.lock().clone()
    }

    /// Journaled calls of one kind.
    pub fn calls_of(&self, operation: Operation) -> Vec<Call> {
        self.journal
            .lock()
            .iter()
            .filter(|call| call.operation() == operation)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.journal.lock().clear();
    }

    /// Number of registered (live) node names.
    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Number of endpoints not yet destroyed, across all nodes.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Names of the endpoints owned by the node registered under `node`.
    pub fn endpoints_of(&self, node: &str) -> Vec<(EndpointKind, String)> {
        let mut found: Vec<_> = self
            .endpoints
            .iter()
            .filter(|entry| entry.owner.name == node && entry.owner.is_alive())
            .map(|entry| (*entry.key(), entry.kind, entry.name.clone()))
            .collect();
        found.sort_by_key(|(id, _, _)| *id);
        found.into_iter().map(|(_, kind, name)| (kind, name)).collect()
    }

    /// Payloads published on `topic`, in order.
    pub fn messages(&self, topic: &str) -> Vec<Vec<u8>> {
        self.messages
            .get(topic)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Journal the call, then apply any pending fault for its operation.
    fn enter(&self, call: Call) -> Result<(), MiddlewareError> {
        let operation = call.operation();
        self.journal.lock().push(call);

        let mut faults = self.faults.lock();
        if let Some(index) = faults.iter().position(|f| f.operation == operation) {
            if faults[index].skip == 0 {
                faults.remove(index);
                tracing::debug!(%operation, "injected failure");
                return Err(MiddlewareError::Injected {
                    operation: operation.as_str(),
                });
            }
            faults[index].skip -= 1;
        }
        Ok(())
    }

    /// Resolve a binding back to this domain's node object.
    fn resolve(&self, node: &NodeBinding) -> Result<Arc<InProcNode>, MiddlewareError> {
        if !node.is_alive() {
            return Err(MiddlewareError::NodeShutdown {
                name: node.name().to_string(),
            });
        }
        self.names
            .get(node.name())
            .filter(|entry| entry.id == node.id())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(MiddlewareError::UnknownNode(node.id()))
    }

    fn create_endpoint(
        &self,
        node: &NodeBinding,
        kind: EndpointKind,
        name: &str,
    ) -> Result<EndpointId, MiddlewareError> {
        let owner = self.resolve(node)?;
        let id = EndpointId(self.next_id());
        self.endpoints.insert(
            id,
            Endpoint {
                kind,
                name: name.to_string(),
                owner,
            },
        );
        Ok(id)
    }

    /// Endpoints of an evicted node are already dead; removing them is a no-op.
    fn destroy_endpoint(
        &self,
        node: &NodeBinding,
        kind: EndpointKind,
        id: EndpointId,
    ) -> Result<(), MiddlewareError> {
        let owned = |_: &EndpointId, e: &Endpoint| e.kind == kind && e.owner.id == node.id();
        let removed = self
            .endpoints
            .remove_if(&id, owned)
            .or_else(|| self.retired.remove_if(&id, owned));
        match removed {
            Some(_) => Ok(()),
            None if !node.is_alive() => Ok(()),
            None => Err(MiddlewareError::UnknownEndpoint(id)),
        }
    }
}

impl Middleware for InProcessDomain {
    fn create_node(&self, name: &str) -> Result<NodeBinding, MiddlewareError> {
        self.enter(Call::CreateNode {
            name: name.to_string(),
        })?;
        let node = Arc::new(InProcNode {
            id: BindingId(self.next_id()),
            name: name.to_string(),
            alive: AtomicBool::new(true),
        });
        if let Some(previous) = self.names.insert(name.to_string(), Arc::clone(&node)) {
            previous.shut_down();
            let retired = &self.retired;
            self.endpoints.retain(|id, e| {
                if e.owner.id != previous.id {
                    return true;
                }
                retired.insert(*id, e.clone());
                false
            });
            tracing::info!(node = name, evicted = %previous.id, replacement = %node.id, "node name taken over");
        }
        Ok(node)
    }

    fn destroy_node(&self, node: &NodeBinding) -> Result<(), MiddlewareError> {
        self.enter(Call::DestroyNode {
            name: node.name().to_string(),
        })?;
        if let Some((_, removed)) = self
            .names
            .remove_if(node.name(), |_, registered| registered.id == node.id())
        {
            removed.shut_down();
        }
        self.endpoints.retain(|_, e| e.owner.id != node.id());
        self.retired.retain(|_, e| e.owner.id != node.id());
        Ok(())
    }

    fn create_publisher(&self, node: &NodeBinding, topic: &str) -> Result<EndpointId, MiddlewareError> {
        self.enter(Call::CreatePublisher {
            node: node.name().to_string(),
            topic: topic.to_string(),
        })?;
        self.create_endpoint(node, EndpointKind::Publisher, topic)
    }

    fn destroy_publisher(&self, node: &NodeBinding, publisher: EndpointId) -> Result<(), MiddlewareError> {
        self.enter(Call::DestroyPublisher {
            node: node.name().to_string(),
            endpoint: publisher,
        })?;
        self.destroy_endpoint(node, EndpointKind::Publisher, publisher)
    }

    fn publish(&self, publisher: EndpointId, payload: &[u8]) -> Result<(), MiddlewareError> {
        self.enter(Call::Publish {
            endpoint: publisher,
            len: payload.len(),
        })?;
        if let Some(retired) = self.retired.get(&publisher) {
            if retired.kind == EndpointKind::Publisher {
                return Err(MiddlewareError::NodeShutdown {
                    name: retired.owner.name.clone(),
                });
            }
        }
        let topic = {
            let endpoint = self
                .endpoints
                .get(&publisher)
                .filter(|e| e.kind == EndpointKind::Publisher)
                .ok_or(MiddlewareError::UnknownEndpoint(publisher))?;
            if !endpoint.owner.is_alive() {
                return Err(MiddlewareError::NodeShutdown {
                    name: endpoint.owner.name.clone(),
                });
            }
            endpoint.name.clone()
        };
        self.messages.entry(topic).or_default().push(payload.to_vec());
        Ok(())
    }

    fn create_service(&self, node: &NodeBinding, service: &str) -> Result<EndpointId, MiddlewareError> {
        self.enter(Call::CreateService {
            node: node.name().to_string(),
            service: service.to_string(),
        })?;
        self.create_endpoint(node, EndpointKind::Service, service)
    }

    fn destroy_service(&self, node: &NodeBinding, service: EndpointId) -> Result<(), MiddlewareError> {
        self.enter(Call::DestroyService {
            node: node.name().to_string(),
            endpoint: service,
        })?;
        self.destroy_endpoint(node, EndpointKind::Service, service)
    }

    fn name(&self) -> &'static str {
        "InProcessDomain"
    }
}
