//! Error types for ARM operations

use thiserror::Error;

pub type ArmResult<T> = Result<T, ArmError>;

#[derive(Debug, Error)]
pub enum ArmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ARM returned HTTP {status}: {message}")]
    Api {
        status: u16,
        /// Provider error code, e.g. `InvalidExtendedLocation`.
        code: Option<String>,
        message: String,
    },

    #[error("response parsing failed: {0}")]
    Parse(String),
}

impl ArmError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ArmError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub fn is_invalid_extended_location(&self) -> bool {
        match self {
            ArmError::Api {
                status: 409,
                code,
                message,
            } => {
                code.as_deref() == Some("InvalidExtendedLocation")
                    || message.contains("InvalidExtendedLocation")
            }
            _ => false,
        }
    }
}
