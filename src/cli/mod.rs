//! CLI module
//!
//! Provides command-line interface for:
//! - check: compile every definition set and report the hierarchy
//! - describe: print one compiled class
//! - validate: validate one record from stdin

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, describe, run, run_command, validate, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
