//! The node and executor surface consumed by the queue.
//!
//! Nodes and executors are owned by the controller's inventory. The queue
//! never manages them; it only asks where an executor lives, whether that
//! node is online, its mode, and whether it belongs to a label.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::task::Label;

/// How a node accepts work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Accepts any task.
    Normal,
    /// Accepts only tasks whose label targets this node.
    Exclusive,
}

/// A host that executors run on.
pub trait Node: Send + Sync {
    /// Node name, unique within the deployment.
    fn name(&self) -> String;

    /// How this node accepts work.
    fn mode(&self) -> Mode;

    /// True for the controller node, false for agents.
    fn is_controller(&self) -> bool;

    /// True while the node is unreachable. Offline nodes receive no work.
    fn is_offline(&self) -> bool;

    /// True when this node belongs to the given label.
    fn has_label(&self, label: &Label) -> bool;
}

/// Identifier of one executor slot within the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutorId(pub u64);

impl fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "executor-{}", self.0)
    }
}

/// Handle for one executor worker, shared between the worker thread calling
/// [`pop`](crate::core::queue::Queue::pop) and whoever may interrupt it.
#[derive(Clone)]
pub struct ExecutorHandle {
    id: ExecutorId,
    name: String,
    node: Arc<dyn Node>,
    interrupted: Arc<AtomicBool>,
}

impl ExecutorHandle {
    /// Creates a handle for an executor slot on the given node.
    pub fn new(id: ExecutorId, name: impl Into<String>, node: Arc<dyn Node>) -> Self {
        Self {
            id,
            name: name.into(),
            node,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The executor's identifier.
    #[must_use]
    pub fn id(&self) -> ExecutorId {
        self.id
    }

    /// The executor's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node this executor runs on.
    #[must_use]
    pub fn node(&self) -> &Arc<dyn Node> {
        &self.node
    }

    /// Requests that this executor's pending rendezvous stop.
    ///
    /// Prefer [`Queue::interrupt`](crate::core::queue::Queue::interrupt),
    /// which also wakes the executor if it is parked.
    pub fn request_interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    /// Consumes a pending interrupt request, returning whether one was set.
    pub(crate) fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::AcqRel)
    }
}

impl fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("node", &self.node.name())
            .finish()
    }
}
