//! `soulbrowser-agent` binary crate: CLI entry point, configuration
//! loading, and logging bootstrap for the browser automation agent.

pub mod cli;
pub mod config;
pub mod logging;
