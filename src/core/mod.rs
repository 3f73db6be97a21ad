//! Core scheduling: the three-stage queue, the dispatch rendezvous, and the
//! resource interlock.

pub mod env;
pub mod error;
pub mod item;
pub mod node;
pub mod queue;
pub mod resources;
pub mod task;

pub use env::Environment;
pub use error::{AppResult, QueueError};
pub use item::{BlockedItem, BuildableItem, Item, WaitingItem};
pub use node::{ExecutorHandle, ExecutorId, Mode, Node};
pub use queue::Queue;
pub use resources::{Resource, ResourceActivity, ResourceController, ResourceList};
pub use task::{Executable, Label, Task, TaskHandle, TaskKey};
