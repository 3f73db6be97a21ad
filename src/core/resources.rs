//! Resource accounting and the mutual-exclusion interlock.
//!
//! An activity (typically a running build) declares the resources it holds
//! for as long as it is in progress. The queue asks one question before it
//! promotes or dispatches a task: can this task's resource list be acquired
//! right now? The controller's lock is internal and brief, so the query is
//! safe to make while the queue monitor is held.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A named unit of mutual exclusion, such as a database or a deploy target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    name: String,
}

impl Resource {
    /// Creates a resource with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The set of resources one activity holds while it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceList {
    resources: Vec<Resource>,
}

impl ResourceList {
    /// An empty list; activities with no declared resources never collide.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Builds a list from resource names.
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resources: names.into_iter().map(Resource::new).collect(),
        }
    }

    /// Adds one resource, builder style.
    #[must_use]
    pub fn with(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// The resources in this list.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// True when the two lists share any resource.
    #[must_use]
    pub fn collides_with(&self, other: &Self) -> bool {
        self.resources
            .iter()
            .any(|r| other.resources.contains(r))
    }
}

/// Something that occupies resources while it runs.
///
/// Tasks are resource activities, and so are the builds they spawn.
pub trait ResourceActivity: Send + Sync {
    /// Resources this activity holds while in progress.
    fn resource_list(&self) -> ResourceList;

    /// Human-readable name, used in "blocked by X" diagnostics.
    fn display_name(&self) -> String;
}

/// Tracks in-progress activities and answers acquisition queries.
///
/// `start`/`finish` bracket an activity's execution; `can_acquire` is the
/// predicate the queue consults before promoting or dispatching a task.
#[derive(Default)]
pub struct ResourceController {
    in_progress: Mutex<Vec<Arc<dyn ResourceActivity>>>,
}

impl ResourceController {
    /// Creates a controller with nothing in progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an activity in progress, reserving its resources.
    pub fn start(&self, activity: Arc<dyn ResourceActivity>) {
        self.in_progress.lock().push(activity);
    }

    /// Declares an activity finished, releasing its resources.
    ///
    /// Activities are matched by display name; finishing an activity that was
    /// never started is a no-op.
    pub fn finish(&self, activity: &dyn ResourceActivity) {
        let name = activity.display_name();
        let mut in_progress = self.in_progress.lock();
        if let Some(idx) = in_progress.iter().position(|a| a.display_name() == name) {
            in_progress.swap_remove(idx);
        }
    }

    /// True iff every resource in `list` is free of in-progress holders.
    #[must_use]
    pub fn can_acquire(&self, list: &ResourceList) -> bool {
        self.in_progress
            .lock()
            .iter()
            .all(|a| !a.resource_list().collides_with(list))
    }

    /// The first in-progress activity holding a resource in `list`, if any.
    #[must_use]
    pub fn blocking_activity(&self, list: &ResourceList) -> Option<Arc<dyn ResourceActivity>> {
        self.in_progress
            .lock()
            .iter()
            .find(|a| a.resource_list().collides_with(list))
            .cloned()
    }
}
