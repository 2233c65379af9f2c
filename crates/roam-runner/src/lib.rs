//! roam-runner: managed server process backend for the console.
//!
//! `ProcessBackend` spawns one child process, publishes its stdout/stderr
//! lines (prefixed, lossily decoded) on a `LogHub` channel together with
//! lifecycle messages, and writes operator commands to its stdin.

mod control;
pub mod process;
pub mod types;

pub use process::ProcessBackend;
pub use types::{ProcessSpec, RunnerError, RunnerOptions, DEFAULT_OUTPUT_PREFIX};

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "roam-runner"
}

#[cfg(test)]
mod tests {
    use super::crate_label;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "roam-runner");
    }
}
