//! CLI module for the bottle-studio crate
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{
    main, Cli, CliExecutionProvider, CliExtractor, CliLogFormat, CliOutputFormat, Command, ModelArgs,
    ProcessArgs,
};

#[cfg(feature = "server")]
pub use main_impl::ServeArgs;
