//! Duels+ Launcher library root
//!
//! Backend bridge, view state and the controller shared by the GUI and CLI.

pub mod bridge;
pub mod config;
pub mod core;
pub mod util;

pub use config::Config;
