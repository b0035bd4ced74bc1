//! Core of the plugin framework: the record model, condition matching,
//! selection, report rendering, the store and the plugin runner.

pub mod condition;
pub mod db;
pub mod error;
pub mod logging;
pub mod record;
pub mod render;
pub mod runner;
pub mod schemas;
pub mod select;
pub mod store;
pub mod time;
