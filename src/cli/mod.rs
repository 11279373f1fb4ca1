//! CLI module for blockjournal
//!
//! Provides command-line interface for:
//! - init: Create and format an image
//! - write: One write through the journal
//! - read: One read through the journal
//! - stat: File attributes plus journal state

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, read, run, run_command, stat, write, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_response;
