//! Azure cluster HA failover daemon
//!
//! Process shell around the reconciliation engine: control-socket event
//! loop, cluster membership polling, configuration reload, rotating log and
//! diagnostics side-file.

pub mod daemon;
pub mod diag;
pub mod logging;
pub mod membership;
pub mod server;
pub mod settings;

pub use daemon::Daemon;
pub use server::{EventHandler, Server};
pub use settings::Settings;
