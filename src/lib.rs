//! Validation, autofix and policy gating for security-scan datasets, plus
//! consolidation and filtering of the risk findings derived from them.

pub mod autofix;
pub mod cli;
pub mod config;
pub mod consolidate;
pub mod core;
pub mod engine;
pub mod error;
pub mod exit;
pub mod filter;
pub mod gate;
pub mod logs;
pub mod scan;
pub mod schedule;
pub mod store;
pub mod ui;
pub mod upstream;
pub mod validate;
pub mod watch;
