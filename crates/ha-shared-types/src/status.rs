//! Failover progress tokens consumed by external status tooling.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverStatus {
    NotStarted,
    InProgress,
    Done,
}

impl FailoverStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            FailoverStatus::NotStarted => "NOT_STARTED",
            FailoverStatus::InProgress => "IN_PROGRESS",
            FailoverStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for FailoverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
