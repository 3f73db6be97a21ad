//! # Forge Queue
//!
//! Build queue and dispatcher for the Forge CI controller.
//!
//! Producers schedule [`Task`](core::Task)s; the queue delays each one
//! through its quiet period so rapid re-triggers coalesce, moves it through
//! the waiting/blocked/buildable lifecycle, and hands it to a free executor
//! on an eligible node. The queue alone decides what runs next, and where.
//!
//! ```text
//! (enter) --> waiting --+--> blocked
//!                       |       ^
//!                       |       |
//!                       |       v
//!                       +--> buildable ---> (dispatched)
//! ```
//!
//! ## Modules
//!
//! - [`core`] - the scheduling state machine, dispatch rendezvous, and
//!   resource interlock
//! - [`config`] - queue configuration
//! - [`event`] - the one-shot wake event used for executor parking
//! - [`infra`] - the snapshot persistence shim
//! - [`util`] - clock and telemetry helpers
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use forge_queue::config::QueueConfig;
//! use forge_queue::core::{ExecutorHandle, ExecutorId, Queue};
//!
//! let queue = Queue::new(env, QueueConfig::default());
//! queue.load();
//!
//! // producer side
//! queue.schedule(site_build);
//!
//! // executor worker thread
//! let executor = ExecutorHandle::new(ExecutorId(0), "agent-1 #0", node);
//! let task = queue.pop(&executor)?;
//! let mut executable = task.create_executable()?;
//! executable.run();
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod event;
pub mod infra;
pub mod util;

// Re-export the types most embedders touch.
pub use self::config::QueueConfig;
pub use self::core::{
    Environment, ExecutorHandle, ExecutorId, Item, Label, Mode, Node, Queue, QueueError, Task,
    TaskHandle, TaskKey,
};
pub use self::event::OneShotEvent;
