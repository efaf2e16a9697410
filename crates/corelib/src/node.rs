//! Node handle and lifecycle.
//!
//! A [`NodeHandle`] is either *invalid* (zeroed or finalized, no
//! implementation behind it) or *valid* (exclusively owns a live node
//! implementation). The third state of the C-style lifecycle, uninitialized
//! memory, cannot be produced in safe Rust.
//!
//! ```text
//!   zeroed ──init──▶ valid ──fini──▶ invalid ──init──▶ valid
//!                                      │
//!                                      └──fini──▶ invalid (no-op)
//! ```
//!
//! Init and fini take `&mut self`, so concurrent use of one handle is a
//! compile-time error. Distinct handles may live on different threads.

use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use crate::allocator::Block;
use crate::error::{Error, Result};
use crate::middleware::{Middleware, NodeBinding};
use crate::name::validate_node_name;
use crate::options::NodeOptions;
use crate::parameter::{ParameterEndpoint, ParameterInfrastructure};

/// Result of a successful init.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Node and (unless disabled) parameter infrastructure are up.
    Ready,
    /// The node is valid but its parameter infrastructure is incomplete.
    Degraded(Error),
}

impl InitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, InitOutcome::Ready)
    }
}

/// State reachable from dependent primitives through a [`NodeRef`].
pub(crate) struct NodeShared {
    pub(crate) binding: NodeBinding,
    pub(crate) middleware: Arc<dyn Middleware>,
}

impl fmt::Debug for NodeShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeShared")
            .field("binding", &self.binding)
            .field("middleware", &self.middleware.name())
            .finish()
    }
}

/// Private node state, exclusively owned by one handle.
///
/// Fields are listed in acquisition order; teardown releases them in reverse.
#[derive(Debug)]
struct NodeImpl {
    record: Block,
    name_storage: Block,
    name: String,
    options: NodeOptions,
    shared: Arc<NodeShared>,
    parameters: Option<ParameterInfrastructure>,
}

impl NodeImpl {
    /// Release everything, continuing past failures.
    fn teardown(self: Box<Self>) -> Vec<Error> {
        let NodeImpl {
            record,
            name_storage,
            name,
            options,
            shared,
            parameters,
        } = *self;
        let mut errors = Vec::new();

        if let Some(parameters) = parameters {
            tracing::trace!(node = %name, endpoints = parameters.endpoints().len(), "tearing down parameter infrastructure");
            errors.extend(parameters.teardown(shared.middleware.as_ref(), &shared.binding));
        }

        tracing::trace!(node = %name, binding = %shared.binding.id(), "destroying middleware node");
        if let Err(err) = shared.middleware.destroy_node(&shared.binding) {
            tracing::warn!(node = %name, error = %err, "failed to destroy middleware node");
            errors.push(err.into());
        }
        // Last strong reference: outstanding NodeRefs stop upgrading here.
        drop(shared);

        drop(options);
        drop(name);
        drop(name_storage);
        drop(record);
        errors
    }
}

/// Public handle to a node.
#[derive(Default)]
pub struct NodeHandle {
    inner: Option<Box<NodeImpl>>,
}

impl NodeHandle {
    /// A handle in the invalid state, ready for [`init`](Self::init).
    pub const fn zeroed() -> Self {
        Self { inner: None }
    }

    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Initialize the node.
    ///
    /// `options = None` uses [`NodeOptions::default`]. If a node named `name`
    /// already exists in the middleware domain, that node is shut down and
    /// this call succeeds.
    ///
    /// # Errors
    ///
    /// - `AlreadyValid` if the handle is valid (handle untouched)
    /// - `InvalidArgument` for a malformed name (handle stays invalid)
    /// - `OutOfMemory` if the allocator refuses the node record or name copy
    /// - `Middleware` if the middleware node cannot be created
    ///
    /// A failure to build the parameter infrastructure does not fail init; it
    /// is reported as [`InitOutcome::Degraded`].
    pub fn init(
        &mut self,
        middleware: &Arc<dyn Middleware>,
        name: &str,
        options: Option<&NodeOptions>,
    ) -> Result<InitOutcome> {
        if let Some(existing) = &self.inner {
            tracing::debug!(node = %existing.name, requested = name, "init on a valid handle rejected");
            return Err(Error::AlreadyValid {
                name: existing.name.clone(),
            });
        }
        validate_node_name(name)?;
        let options = options.cloned().unwrap_or_default();

        let record = options.allocator.allocate(mem::size_of::<NodeImpl>())?;
        let name_storage = options.allocator.allocate(name.len() + 1)?;
        let name = name.to_owned();

        let binding = middleware.create_node(&name).map_err(|err| {
            tracing::debug!(node = %name, error = %err, "middleware node creation failed");
            Error::from(err)
        })?;

        let (parameters, outcome) = if options.no_parameters {
            (None, InitOutcome::Ready)
        } else {
            let (infra, failure) =
                ParameterInfrastructure::create(middleware.as_ref(), &binding, &options.allocator);
            let outcome = match failure {
                None => InitOutcome::Ready,
                Some(err) => {
                    tracing::warn!(
                        node = %name,
                        created = infra.endpoints().len(),
                        error = %err,
                        "parameter infrastructure incomplete"
                    );
                    InitOutcome::Degraded(err)
                }
            };
            (Some(infra), outcome)
        };

        tracing::debug!(
            node = %name,
            binding = %binding.id(),
            middleware = middleware.name(),
            allocator = options.allocator.name(),
            "node initialized"
        );
        self.inner = Some(Box::new(NodeImpl {
            record,
            name_storage,
            name,
            options,
            shared: Arc::new(NodeShared {
                binding,
                middleware: Arc::clone(middleware),
            }),
            parameters,
        }));
        Ok(outcome)
    }

    /// Finalize the node.
    ///
    /// A no-op on an invalid handle. On a valid handle every resource init
    /// acquired is released in reverse order; failing steps are collected into
    /// [`Error::Teardown`] without stopping the sequence. The handle is invalid
    /// on return either way.
    pub fn fini(&mut self) -> Result<()> {
        let Some(node) = self.inner.take() else {
            return Ok(());
        };
        let name = node.name.clone();
        let errors = node.teardown();
        if errors.is_empty() {
            tracing::debug!(node = %name, "node finalized");
            Ok(())
        } else {
            tracing::warn!(node = %name, failed_steps = errors.len(), "node finalized with errors");
            Err(Error::Teardown(errors))
        }
    }

    /// The node's name, or `None` if the handle is invalid.
    pub fn name(&self) -> Option<&str> {
        self.inner.as_deref().map(|node| node.name.as_str())
    }

    /// The options applied at init, or `None` if the handle is invalid.
    pub fn options(&self) -> Option<&NodeOptions> {
        self.inner.as_deref().map(|node| &node.options)
    }

    /// The middleware binding, or `None` if the handle is invalid.
    pub fn middleware_binding(&self) -> Option<&NodeBinding> {
        self.inner.as_deref().map(|node| &node.shared.binding)
    }

    /// Endpoints of the auto-created parameter infrastructure.
    ///
    /// Empty when the node was created with `no_parameters`.
    pub fn parameter_endpoints(&self) -> Option<&[ParameterEndpoint]> {
        self.inner.as_deref().map(|node| match &node.parameters {
            Some(parameters) => parameters.endpoints(),
            None => &[],
        })
    }

    /// Non-owning back-reference for dependent primitives.
    pub fn downgrade(&self) -> Option<NodeRef> {
        self.inner.as_deref().map(|node| NodeRef {
            shared: Arc::downgrade(&node.shared),
        })
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        if let Err(err) = self.fini() {
            tracing::warn!(error = %err, "node dropped while valid; teardown reported errors");
        }
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.debug_tuple("NodeHandle").field(&name).finish(),
            None => f.write_str("NodeHandle(<invalid>)"),
        }
    }
}

/// Validity-checked, non-owning reference from a dependent primitive to its node.
#[derive(Clone, Debug)]
pub struct NodeRef {
    shared: Weak<NodeShared>,
}

impl NodeRef {
    /// True while the node has not been finalized.
    pub fn is_valid(&self) -> bool {
        self.shared.strong_count() > 0
    }

    pub(crate) fn upgrade(&self) -> Result<Arc<NodeShared>> {
        self.shared.upgrade().ok_or(Error::NodeInvalid)
    }
}
