//! Command-line front end for glazier-bgremove
//!
//! Only available with the `cli` feature.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{
    is_interrupted, main, output_path_for, Cli, CliBackend, CliExecutionProvider, CliLogFormat,
    CliMode, CliOutputFormat, Interrupted, DEFAULT_TOLERANCE, INTERRUPTED_EXIT_CODE,
};
