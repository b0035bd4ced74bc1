//! forensicstore plugins
//!
//! Post-processing plugins for forensicstore evidence containers. A plugin is a
//! small executable that either describes itself (`<plugin> info`) or opens a
//! store, selects records matching declarative conditions, derives new records
//! or a rendered report from them, writes the results back and closes the store
//! (`<plugin> run`).
//!
//! # Pipeline
//!
//! ```text
//! runner ─▶ select ─▶ condition::matches ─▶ transform / render_report ─▶ Store::insert ─▶ close
//! ```
//!
//! # Conditions
//!
//! A [`ConditionSet`](crate::core::condition::ConditionSet) is an OR of
//! [`Condition`](crate::core::condition::Condition)s, each an AND of field
//! equalities. The `key` field accepts `%` as a single path segment wildcard:
//! `HKEY_USERS\%\Software` matches the `Software` key of every user hive.
//!
//! # Plugins
//!
//! - `runkeys`: one `runkey` item per value below the Windows Run keys
//! - `report`: render all items of a type into `Reports/<name>.md`
//!
//! # Examples
//!
//! ```bash
//! forensicstore-runkeys info
//! forensicstore-runkeys --store case.forensicstore
//! forensicstore-report runkey runkeys.md --store case.forensicstore
//! forensicstore-report run runkey runkeys.md --templates ./templates
//! ```
//!
//! # Crate Structure
//!
//! - [`core`](crate::core): record model, conditions, store, rendering, runner
//! - [`plugins`](crate::plugins): plugin implementations

pub mod core;
pub mod plugins;
