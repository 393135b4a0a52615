//! TGecomm CLI library
//!
//! Command-line parsing, configuration loading, console rendering and the
//! interactive menu loop for the `tgecomm` binary.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod ui;

pub use app::{App, AppExit};
pub use cli::Cli;
pub use config::load_configuration;
pub use error::{CliError, Result};
