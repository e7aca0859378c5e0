//! `ado-digest`: Azure DevOps work item digests written by a local model.
//!
//! This crate wires the deterministic [`pipeline`] to the outside world:
//! - `ado`: REST client for work items, links and update history
//! - `ollama`: chat backend with model readiness checks
//! - `config` / `cli`: flags, environment and TOML resolved into one value
//! - `orchestrator`: the sequential per-item loop that yields the report

pub mod ado;
pub mod cli;
pub mod config;
pub mod ollama;
pub mod orchestrator;

pub use config::DigestConfig;
pub use orchestrator::Orchestrator;
