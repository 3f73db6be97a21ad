//! Tracing bootstrap for controller processes that embed the queue.

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber unless the embedder already set one.
///
/// `RUST_LOG` takes precedence; without it, the queue's own events stay at
/// info and everything else at warn. Thread names are included because the
/// interesting interleavings here are per-thread: executor workers inside
/// `pop` and the `queue-maintenance` ticker.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,forge_queue=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
