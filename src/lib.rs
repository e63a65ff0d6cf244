//! devenv - command-line client for remote development environments.

pub mod api;
pub mod auth;
pub mod buildlog;
pub mod commands;
pub mod config;
pub mod display;
pub mod render;
