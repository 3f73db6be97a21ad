//! Queue items: a task plus the metadata of the stage it currently sits in.
//!
//! The three-stage lifecycle is modeled as three small structs and a sum
//! type; the stage collections in the queue keep the variants naturally
//! segregated.

use std::cmp::Ordering;

use crate::core::env::Environment;
use crate::core::resources::ResourceController;
use crate::core::task::TaskHandle;

/// An item still inside its quiet period.
///
/// Ordered by `(due_at_ms, id)`: earliest due first, and arrival order among
/// items due at the same instant. The id is unique, so the order is total.
#[derive(Clone)]
pub struct WaitingItem {
    /// The task to be built.
    pub task: TaskHandle,
    /// Wall-clock instant (ms since epoch) this item becomes eligible.
    pub due_at_ms: u64,
    /// Allocation-ordered unique number.
    pub id: u64,
}

impl WaitingItem {
    pub(crate) fn new(task: TaskHandle, due_at_ms: u64, id: u64) -> Self {
        Self {
            task,
            due_at_ms,
            id,
        }
    }

    /// Why this item is still queued, for status displays.
    #[must_use]
    pub fn why(&self, now_ms: u64) -> String {
        if self.due_at_ms > now_ms {
            format!(
                "in the quiet period for another {}",
                fmt_span(self.due_at_ms - now_ms)
            )
        } else {
            "pending".to_string()
        }
    }

    pub(crate) fn into_buildable(self, now_ms: u64) -> BuildableItem {
        BuildableItem {
            task: self.task,
            since_ms: now_ms,
        }
    }

    pub(crate) fn into_blocked(self, now_ms: u64) -> BlockedItem {
        BlockedItem {
            task: self.task,
            since_ms: now_ms,
        }
    }
}

impl PartialEq for WaitingItem {
    fn eq(&self, other: &Self) -> bool {
        self.due_at_ms == other.due_at_ms && self.id == other.id
    }
}

impl Eq for WaitingItem {}

impl PartialOrd for WaitingItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WaitingItem {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due_at_ms, self.id).cmp(&(other.due_at_ms, other.id))
    }
}

/// An item whose quiet period has passed but whose task cannot run yet:
/// another run is in progress, a resource is held, or the task holds itself
/// back.
#[derive(Clone)]
pub struct BlockedItem {
    /// The task to be built.
    pub task: TaskHandle,
    /// Instant the item first left the waiting stage; preserved across
    /// blocked/buildable cycles so observers see the true transit time.
    pub since_ms: u64,
}

impl BlockedItem {
    /// Why this item is blocked, for status displays.
    #[must_use]
    pub fn why(&self, resources: &ResourceController) -> String {
        if let Some(holder) = resources.blocking_activity(&self.task.resource_list()) {
            if holder.display_name() == self.task.display_name() {
                return "a build is already in progress".to_string();
            }
            return format!("blocked by {}", holder.display_name());
        }
        self.task.why_blocked()
    }

    pub(crate) fn into_buildable(self) -> BuildableItem {
        BuildableItem {
            task: self.task,
            since_ms: self.since_ms,
        }
    }
}

/// An item ready to run, waiting for a free executor on an eligible node.
#[derive(Clone)]
pub struct BuildableItem {
    /// The task to be built.
    pub task: TaskHandle,
    /// Instant the item first left the waiting stage.
    pub since_ms: u64,
}

impl BuildableItem {
    /// Why this item has not been dispatched, for status displays.
    #[must_use]
    pub fn why(&self, env: &dyn Environment) -> String {
        if let Some(label) = self.task.assigned_label() {
            let nodes = env.label_nodes(&label);
            if !nodes.is_empty() && nodes.iter().all(|n| n.is_offline()) {
                if nodes.len() == 1 {
                    return format!("{} is offline", nodes[0].name());
                }
                return format!("all nodes of label '{label}' are offline");
            }
            return format!("waiting for the next available executor on label '{label}'");
        }
        "waiting for the next available executor".to_string()
    }

    pub(crate) fn into_blocked(self) -> BlockedItem {
        BlockedItem {
            task: self.task,
            since_ms: self.since_ms,
        }
    }
}

/// Snapshot of one queued task, in whichever stage it currently occupies.
#[derive(Clone)]
pub enum Item {
    /// Still inside its quiet period.
    Waiting(WaitingItem),
    /// Past its quiet period, held back by blocking or resources.
    Blocked(BlockedItem),
    /// Ready, waiting for an executor.
    Buildable(BuildableItem),
}

impl Item {
    /// The task this item wraps.
    #[must_use]
    pub fn task(&self) -> &TaskHandle {
        match self {
            Self::Waiting(i) => &i.task,
            Self::Blocked(i) => &i.task,
            Self::Buildable(i) => &i.task,
        }
    }

    /// True for the blocked stage.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    /// True for the buildable stage.
    #[must_use]
    pub fn is_buildable(&self) -> bool {
        matches!(self, Self::Buildable(_))
    }
}

/// Renders a millisecond span the way the status pages do: sub-minute spans
/// in seconds, everything else as minutes and seconds.
fn fmt_span(ms: u64) -> String {
    let secs = ms.div_ceil(1000);
    if secs < 60 {
        format!("{secs} s")
    } else {
        format!("{} min {} s", secs / 60, secs % 60)
    }
}
