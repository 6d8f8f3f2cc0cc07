pub mod app;
pub mod apply;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod init;
pub mod output;
pub mod report;
pub mod rules;
pub mod runtime;
pub mod serve;
