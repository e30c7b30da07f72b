//! # TaskFlow Application Library
//!
//! Wires the shared core and the notifier into a runnable process.
//!
//! ## Modules
//!
//! - `config`: Process configuration from the environment
//! - `bootstrap`: Store selection, sync layer mounting, session construction
//! - `runner`: Headless loop keeping a session live and running reminders

pub mod bootstrap;
pub mod config;
pub mod runner;
