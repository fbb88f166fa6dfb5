//! Simple to use cli/daemon for tracking what you work on throughout the day.
//! Samples the focused window, classifies it into cost and task categories with configurable
//! rules, and keeps a duration-weighted log in SQLite that can be summarized from a terminal.
//!

pub mod analysis;
pub mod classification;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod utils;
pub mod window_api;
