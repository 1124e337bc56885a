//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Files
//! - `seed.rs` — `seed` in list, dry-run and apply modes.
//! - `project.rs` — `apps` and `config` inspection.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate business logic to `services/*`.
//! - Keep behavior and output schema stable.

pub mod project;
pub mod seed;

pub use project::{handle_apps, handle_config};
pub use seed::handle_seed;
