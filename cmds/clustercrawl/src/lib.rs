//! Resumable, cache-backed crawler for cluster inventory and workload
//! snapshots.
//!
//! A crawl resolves the clusters of every configured tenant, describes each
//! of them through the control-plane CLI and collects pods and ingresses
//! through the orchestration CLI. Every result is cached in a per-day
//! directory, so an interrupted or partially failed run picks up where it
//! left off. See [`run::run_crawl`] for the entry point.

pub mod cache;
pub mod commands;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod directory;
pub mod error;
pub mod exec;
pub mod marker;
pub mod outcome;
pub mod pipeline;
pub mod report;
pub mod run;
pub mod status;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
