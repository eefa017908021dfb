//! # tcrm-shell
//!
//! A Rust library for launching external programs from developer tooling.
//! Built for CLIs that need to run a tool, capture or stream what it prints,
//! and report failures with enough context to render a useful diagnostic.
//!
//! ## Features
//!
//! - **Five execution modes**: pass-through run, stdout capture, combined
//!   stdout/stderr capture, line streaming and process image replacement
//! - **Structured errors**: every failure carries the program, arguments,
//!   working directory, environment overrides, exit code and, when retained,
//!   the captured stderr
//! - **Pluggable executor**: swap the OS backend per command or process-wide
//!   to test error paths without spawning anything
//! - **Environment helpers**: `KEY=VALUE` codec and scoped environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tcrm_shell::shell::command::Command;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let out = Command::new("cat")
//!         .arg("-b")
//!         .stdin(&b"input"[..])
//!         .output_string(true)
//!         .await?;
//!
//!     assert_eq!(out, "     1\tinput");
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming Lines
//!
//! ```rust,no_run
//! use tcrm_shell::shell::command::Command;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut lines = Vec::new();
//!     Command::new("ls")
//!         .args(["-1", "/"])
//!         .echo(false)
//!         .lines(|line| lines.push(line))
//!         .await?;
//!
//!     println!("{} entries", lines.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Inspecting Failures
//!
//! ```rust,no_run
//! use tcrm_shell::shell::command::Command;
//!
//! #[tokio::main]
//! async fn main() {
//!     let err = Command::new("cat").arg("missing.txt").run().await.unwrap_err();
//!
//!     assert_eq!(err.command(), "cat");
//!     assert_eq!(err.exit_code(), 1);
//!     eprintln!("{err}");
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `serde`: Enable serialization support for [`shell::error::ExecutionReport`]
//! - `tracing`: Enable structured logging integration

mod helper;
pub mod shell;
