//! Configuration models for the queue and its tuning thresholds.

pub mod queue;

pub use queue::QueueConfig;
