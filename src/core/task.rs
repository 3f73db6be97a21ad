//! The task surface the queue schedules against.
//!
//! Tasks live outside the queue; the queue only consumes the narrow
//! capability set below. Identity is an explicit [`TaskKey`]: two handles
//! with equal keys are the same task, and the queue collapses them into one
//! entry. That collapse is what bounds the backlog when a task is
//! re-triggered faster than it can build.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::QueueError;
use crate::core::resources::ResourceActivity;

/// Stable identity key for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey(String);

impl TaskKey {
    /// Creates a key from the task's unique name.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named group of nodes. A task with an assigned label runs only on nodes
/// belonging to that label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    /// Creates a label with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The label name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The body of work produced for a dispatched task.
pub trait Executable: Send {
    /// Performs the task. Called at most once, on the executor's thread.
    fn run(&mut self);
}

/// A shared handle to a task.
pub type TaskHandle = Arc<dyn Task>;

/// A unit of work the queue can schedule.
///
/// Implementations also expose a resource list and a display name through
/// [`ResourceActivity`]; the display name doubles as the "blocked by X"
/// diagnostic when another run of the same task holds a resource.
pub trait Task: ResourceActivity {
    /// Stable identity; equal keys collapse into one queue entry.
    fn key(&self) -> TaskKey;

    /// Unique name, also the line format of the persistence snapshot.
    fn name(&self) -> String;

    /// The label this task is pinned to, or `None` to run anywhere.
    fn assigned_label(&self) -> Option<Label> {
        None
    }

    /// The node the previous run built on, when the task prefers to return
    /// to it.
    fn last_built_on(&self) -> Option<String> {
        None
    }

    /// True while execution should be held back for temporary reasons beyond
    /// resource contention (for example, a run already in progress).
    fn is_build_blocked(&self) -> bool;

    /// Human-readable reason shown while [`Task::is_build_blocked`] is true.
    fn why_blocked(&self) -> String;

    /// Estimated duration in milliseconds, or -1 when unknown.
    fn estimated_duration_ms(&self) -> i64 {
        -1
    }

    /// Default delay between scheduling and dispatch eligibility.
    fn quiet_period(&self) -> Duration {
        Duration::ZERO
    }

    /// Creates the executable that performs this task.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Executable`] when the task cannot produce a
    /// runnable body (for example, its definition was deleted).
    fn create_executable(&self) -> Result<Box<dyn Executable>, QueueError>;

    /// True when the current caller may abort this task.
    fn has_abort_permission(&self) -> bool {
        true
    }

    /// Like [`Task::has_abort_permission`], but reports the failure as an
    /// error for callers that want to propagate it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::PermissionDenied`] when the permission is not
    /// granted.
    fn check_abort_permission(&self) -> Result<(), QueueError> {
        if self.has_abort_permission() {
            Ok(())
        } else {
            Err(QueueError::PermissionDenied(self.name()))
        }
    }
}
