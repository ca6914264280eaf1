//! Node context injection for per-node logging
//!
//! A replay drives many nodes from one thread. This module keeps the node
//! currently being driven in thread-local storage so that every span opened
//! while it is active can be tagged with its identity.

use std::cell::RefCell;

use oppnet_core::PeerIdentity;
use uuid::Uuid;

/// Node context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContextData {
    /// The node's identity as a string
    pub node_id: String,
    /// Unique instance ID for this node session
    pub instance_id: Uuid,
}

thread_local! {
    static NODE_CONTEXT: RefCell<Option<NodeContextData>> = const { RefCell::new(None) };
}

/// RAII guard for node context
///
/// Creating the guard sets the node context for the current thread; dropping
/// it restores whatever context was active before, so guards nest.
///
/// # Example
///
/// ```ignore
/// use oppnet_core::NodeAddress;
/// use oppnet_logging::NodeContextGuard;
///
/// let _guard = NodeContextGuard::new(&NodeAddress(3));
///
/// // Spans opened in this scope carry node_id = "3"
/// let _span = tracing::debug_span!("contact").entered();
/// ```
pub struct NodeContextGuard {
    previous: Option<NodeContextData>,
}

impl NodeContextGuard {
    /// Set the node identity for the current scope
    pub fn new<I: PeerIdentity>(identity: &I) -> Self {
        Self::with_instance_id(identity, Uuid::new_v4())
    }

    /// Set the node identity with a specific instance ID
    ///
    /// Lets a node keep one instance ID across all of its hooks in a run.
    pub fn with_instance_id<I: PeerIdentity>(identity: &I, instance_id: Uuid) -> Self {
        let next = NodeContextData {
            node_id: identity.short_id(),
            instance_id,
        };
        let previous = NODE_CONTEXT.with(|ctx| ctx.borrow_mut().replace(next));
        Self { previous }
    }

    /// Get the current node context (if any)
    pub fn current() -> Option<NodeContextData> {
        NODE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current node ID (if set)
    pub fn current_node_id() -> Option<String> {
        Self::current().map(|ctx| ctx.node_id)
    }

    /// Get the current instance ID (if set)
    pub fn current_instance_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.instance_id)
    }
}

impl Drop for NodeContextGuard {
    fn drop(&mut self) {
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a node context active
///
/// # Example
///
/// ```ignore
/// with_node_context!(&node, {
///     tracing::debug!("processing contact");
/// });
/// ```
#[macro_export]
macro_rules! with_node_context {
    ($identity:expr, $body:block) => {{
        let _guard = $crate::context::NodeContextGuard::new($identity);
        $body
    }};
}
