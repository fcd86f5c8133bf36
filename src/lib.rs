//! how - turn a plain-language request into a shell command.
//!
//! The library asks a language model for a command, shows it to the user,
//! runs it once approved, and when it fails sends the error back to the model
//! for a corrected command. This repeats until a command succeeds, the user
//! says no, or something unrecoverable happens.
//!
//! # Architecture
//!
//! - [`controller`] - The refine-execute loop and its state machine
//! - [`conversation`] - Append-only message history and the seed prompt
//! - [`proposal`] - Model client, proposal parsing, model fallback
//! - [`executor`] - Runs approved commands through the shell
//! - [`confirmation`] - Shows a proposal and asks Yes/No
//! - [`providers`] - Status spinner and host environment seams
//! - [`http_client`] - HTTP client abstraction
//! - [`config`] - Persisted settings and their resolution
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use how::controller::Controller;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut controller = Controller::new(client, executor, confirmation, status, 5);
//!     let report = controller.run("list files in current directory", &target).await;
//!     println!("{:?}", report.outcome);
//!     Ok(())
//! }
//! ```
//!
//! # Retrying
//!
//! A failing command is not an error. Its stderr (or exit status) becomes a
//! new user turn asking the model to fix the command, and the loop proposes
//! again. The number of failed executions is capped by `maxAttempts`
//! (default 5, `--max-attempts` on the command line).

pub mod config;
pub mod confirmation;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod executor;
pub mod http_client;
pub mod proposal;
pub mod providers;
