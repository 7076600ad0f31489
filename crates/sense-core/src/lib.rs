//! kuro-sense core library.
//!
//! This crate provides:
//! - The built-in perception capability catalog
//! - Dependency probing and capability detection
//! - A format-preserving model of `agent-compose.yaml`
//! - Reconciliation of the first agent's perception plugin list
//! - Logging setup, exit codes and report rendering for the CLI

pub mod catalog;
pub mod compose;
pub mod detect;
pub mod exit_codes;
pub mod logging;
pub mod probe;
pub mod reconcile;
pub mod report;
