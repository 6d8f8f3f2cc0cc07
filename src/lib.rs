//! Command-line host for the element hider agent.
//!
//! Runs the enforcement agent against page fixtures and exposes the command
//! protocol over stdin/stdout.

pub mod cli;
pub mod config;

pub use config::Config;
