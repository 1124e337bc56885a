//! Service layer containing seed discovery, resolution and execution.
//!
//! ## Service map
//! - `config.rs` — settings file lookup, parsing and validation.
//! - `locator.rs` — seed files matching the pattern in one directory.
//! - `discovery.rs` — application enumeration, execution plan and catalog.
//! - `unit.rs` — reading a seed file and its `depends` header.
//! - `graph.rs` — transitive resolution and cycle detection.
//! - `loader.rs` — dependency-first, at-most-once loading per run.
//! - `store.rs` — SQLite connection and transaction scopes.
//! - `runner.rs` — list / dry-run / apply orchestration.
//! - `helpers.rs` — logging, slug, hash and placeholder helpers for seed SQL.
//! - `output.rs` — JSON/text output helpers and console progress.
//!
//! ## Conventions
//! - Prefer pure helpers where possible.
//! - Side effects should be explicit and localized.
//! - Keep command handlers thin; delegate to services.

pub mod config;
pub mod discovery;
pub mod graph;
pub mod helpers;
pub mod loader;
pub mod locator;
pub mod output;
pub mod runner;
pub mod store;
pub mod unit;
