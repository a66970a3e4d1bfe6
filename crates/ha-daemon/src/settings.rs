//! Daemon file locations, rooted in the product installation directory.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Settings {
    pub fwdir: PathBuf,
    pub cloud_version_path: PathBuf,
}

impl Settings {
    pub fn pid_file(&self) -> PathBuf {
        self.fwdir.join("tmp/ha.pid")
    }

    pub fn socket_file(&self) -> PathBuf {
        self.fwdir.join("tmp/ha.sock")
    }

    pub fn log_file(&self) -> PathBuf {
        self.fwdir.join("log/azure_had.elg")
    }

    pub fn status_file(&self) -> PathBuf {
        self.fwdir.join("tmp/cloud_failover_status")
    }
}
