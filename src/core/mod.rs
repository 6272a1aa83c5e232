//! Core module
//!
//! View state for the launcher and the controller that drives it.

pub mod account;
pub mod controller;
pub mod flow;
pub mod logs;
pub mod presence;
pub mod proxy;
pub mod releases;
pub mod settings;
