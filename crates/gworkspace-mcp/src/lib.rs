//! MCP stdio servers exposing Google Workspace APIs as tools

pub mod config;
pub mod initialize;
pub mod install;
pub mod server;
pub mod tools;
