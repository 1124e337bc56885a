//! Shared data model layer (structs/constants only).
//!
//! ## Purpose
//! - Keep plan/report/configuration structs in one place.
//! - Make JSON output schema changes explicit and reviewable.
//!
//! ## Files
//! - `models.rs` — settings, plan, outcome and report structs.
//! - `errors.rs` — typed error kinds surfaced by discovery, loading and running.
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem/database side effects.
//!
//! ## Compatibility note
//! Changes in these structs can affect `--json` outputs.
//! Keep schema-impacting changes synchronized with `docs/contracts/*`.

pub mod errors;
pub mod models;
