//! Process-backed engines for the nosqlkit lifecycle core.
//!
//! [`ProcessEngine`] implements [`nosqlkit_lifecycle::EngineHooks`] for any
//! engine that runs as an external server binary. Launch commands come from
//! per-engine presets in [`presets`], built from an
//! [`nosqlkit_config::EngineConfig`]; tests and unusual installations can
//! substitute their own [`ServerCommand`]. A running server is published as a
//! [`ServerInstance`].

mod engine;
mod instance;
pub mod presets;

pub use engine::ProcessEngine;
pub use instance::ServerInstance;
pub use presets::{GeneratedFile, ServerCommand, preset};

/// Tracing target for engine hooks.
pub(crate) const ENGINES_TARGET: &str = "nosqlkit_engines";
