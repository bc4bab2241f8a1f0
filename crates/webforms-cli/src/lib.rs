//! WebForms CLI library
//!
//! Drives the demo page through the same pipeline a web host would use:
//! render it fresh, post its hidden fields back, or inspect a state token.

pub mod cli;
pub mod commands;
pub mod config;
pub mod demo;
pub mod error;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use error::{CliError, Result};
