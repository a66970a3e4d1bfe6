//! Local cluster membership probe
//!
//! Wraps the external `cphaprob stat` invocation and the parse of its state
//! table. Only the local member's state matters here; the daemon acts when
//! it reports active.

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

/// Membership states that put this node in charge of the data path.
pub const ACTIVE_STATES: [&str; 2] = ["active", "active attention"];

#[async_trait]
pub trait MembershipProbe: Send + Sync {
    /// Raw state table output.
    async fn stat(&self) -> Result<String>;
}

pub struct CphaProbe {
    command: PathBuf,
}

impl CphaProbe {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for CphaProbe {
    fn default() -> Self {
        Self::new("cphaprob")
    }
}

#[async_trait]
impl MembershipProbe for CphaProbe {
    async fn stat(&self) -> Result<String> {
        let output = Command::new(&self.command)
            .arg("stat")
            .output()
            .await
            .with_context(|| format!("failed to run {} stat", self.command.display()))?;
        if !output.status.success() {
            bail!(
                "{} stat exited with {}: {}",
                self.command.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Lower-cased state of the `(local)` row, or `unknown` when the table does
/// not match.
pub fn parse_local_state(output: &str) -> String {
    static STATE_RE: OnceLock<Regex> = OnceLock::new();
    let re = STATE_RE.get_or_init(|| {
        Regex::new(r"(?s)^.*\(local\)\s*([0-9.]*)\s*[0-9.%]*\s*([a-zA-Z]*).*$")
            .expect("membership state pattern")
    });
    re.captures(output)
        .map(|captures| captures[2].to_ascii_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE_TABLE: &str = "\
Cluster Mode:   High Availability (Active Up) with IGMP Membership

ID         Unique Address  Assigned Load   State          Name
1 (local)  10.0.1.4        100%            ACTIVE         member1
2          10.0.1.5        0%              STANDBY        member2
";

    const STANDBY_TABLE: &str = "\
ID         Unique Address  Assigned Load   State          Name
1          10.0.1.4        100%            ACTIVE         member1
2 (local)  10.0.1.5        0%              STANDBY        member2
";

    #[test]
    fn parses_active_local_member() {
        assert_eq!(parse_local_state(ACTIVE_TABLE), "active");
        assert!(ACTIVE_STATES.contains(&parse_local_state(ACTIVE_TABLE).as_str()));
    }

    #[test]
    fn parses_standby_local_member() {
        assert_eq!(parse_local_state(STANDBY_TABLE), "standby");
        assert!(!ACTIVE_STATES.contains(&parse_local_state(STANDBY_TABLE).as_str()));
    }

    #[test]
    fn unmatched_output_is_unknown() {
        assert_eq!(parse_local_state("no members here"), "unknown");
        assert_eq!(parse_local_state(""), "unknown");
    }

    #[test]
    fn down_state_is_not_active() {
        let table = "1 (local)  10.0.1.4        0%              DOWN           member1\n";
        assert_eq!(parse_local_state(table), "down");
    }
}
