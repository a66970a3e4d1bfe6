//! Cluster failover status file
//!
//! External tooling consumes these tokens; consecutive identical writes are
//! skipped so that transitions map one-to-one onto file updates.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use log::debug;

use ha_shared_types::FailoverStatus;

pub struct StatusFile {
    path: PathBuf,
    last: Mutex<Option<FailoverStatus>>,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: Mutex::new(None),
        }
    }

    pub fn set(&self, status: FailoverStatus) -> io::Result<()> {
        let mut last = self.last.lock().unwrap_or_else(|err| err.into_inner());
        if *last == Some(status) {
            return Ok(());
        }
        debug!("updating cluster status file with {} status", status);
        fs::write(&self.path, format!("{}\n", status.as_str()))?;
        *last = Some(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_tokens_and_skips_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        let status = StatusFile::new(&path);

        status.set(FailoverStatus::InProgress).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "IN_PROGRESS\n");

        // repeat write is skipped: remove the file and observe it stays gone
        fs::remove_file(&path).unwrap();
        status.set(FailoverStatus::InProgress).unwrap();
        assert!(!path.exists());

        status.set(FailoverStatus::Done).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "DONE\n");
    }
}
