pub mod engine;
pub mod runtime;

// Re-export the runtime functions so frontends can simply do:
pub use runtime::{run_production_mode, run_replay_mode, spawn_shutdown_listener};
