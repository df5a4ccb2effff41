//! `coloracao` command-line client.
//!
//! Submits photos for color extraction, classifies the resulting colors
//! into a seasonal palette and renders the results in the terminal and as
//! SVG reports. All commands except `login`, `logout`, `status`
//! and `check-config` require an active session.

pub mod args;
pub mod commands;
pub mod render;
pub mod report;

pub use args::{Cli, Command};
pub use commands::App;
