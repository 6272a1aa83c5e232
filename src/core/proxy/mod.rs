//! Proxy module
//!
//! Launch button state, updater status and the payloads that drive them.

pub mod models;
mod session;
mod tracker;

pub use models::{DownloadProgress, ProxyErrorReport, RpcUserData, Severity, UpdaterStatus};
pub use session::{
    ButtonAction, ButtonView, ErrorDialog, ProxySession, ProxyViewState, SessionRequest,
};
pub use tracker::{UpdaterChange, UpdaterTracker};
