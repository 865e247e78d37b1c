//! webforge - a dependency-aware asset pipeline orchestrator.
//!
//! A TOML manifest declares named tasks; each task collects sources by glob,
//! pushes them through an ordered stage pipeline and writes the result to its
//! destination. Tasks may depend on each other and are executed in topological
//! order. Stages can be gated on the development/production environment flag.

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod pipeline;
pub mod runner;
pub mod serve;
pub mod watch;
