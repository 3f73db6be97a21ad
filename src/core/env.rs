//! The controller environment the queue runs inside.

use std::sync::Arc;

use crate::core::node::Node;
use crate::core::task::{Label, TaskHandle};

/// Narrow view of the surrounding controller.
///
/// Passed into queue construction instead of being reached through a global,
/// so tests can substitute deployments of any shape.
pub trait Environment: Send + Sync {
    /// True while the controller is preparing for shutdown. No new work is
    /// dispatched in this state, even to idle executors.
    fn is_quieting_down(&self) -> bool;

    /// Number of agent (non-controller) nodes in the deployment.
    fn agent_count(&self) -> usize;

    /// Resolves a persisted task name back to a live task, if it still
    /// exists.
    fn resolve_task(&self, name: &str) -> Option<TaskHandle>;

    /// The nodes belonging to a label, used only for status displays.
    fn label_nodes(&self, _label: &Label) -> Vec<Arc<dyn Node>> {
        Vec::new()
    }
}
