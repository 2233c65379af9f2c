//! roam-cli: line-mode front end for the roam console.
//!
//! `roam run -- <cmd>` attaches the console to a managed process;
//! `roam replay <file>` feeds a saved log through the same pipeline.

pub mod app;
pub mod args;
pub mod config;
pub mod input;
pub mod logging;
pub mod render;

/// Run with the process arguments and return the exit code.
pub fn run_from_env() -> i32 {
    app::run_with_args(std::env::args_os())
}

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "roam-cli"
}
