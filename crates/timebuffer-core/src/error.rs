//! Error types for timebuffer

use crate::registry::Role;
use crate::Frame;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("another {role} is already bound to buffer '{key}'")]
    NameCollision { key: String, role: Role },

    #[error("no reader is bound to buffer '{0}'")]
    MissingCounterpart(String),

    #[error("{0} is not bound to a buffer name")]
    Unbound(Role),

    #[error("ordering violation on buffer '{key}' at frame {frame}: {reason}")]
    OrderingViolation {
        key: String,
        frame: Frame,
        reason: String,
    },

    #[error("timed out after {timeout_ms}ms waiting for buffer '{key}' at frame {frame}")]
    Timeout {
        key: String,
        frame: Frame,
        timeout_ms: u64,
    },

    #[error("wait cancelled")]
    Cancelled,

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Result code surfaced to the driver for this failure
    pub fn status(&self) -> Status {
        match self {
            Error::NameCollision { .. } => Status::NameCollision,
            Error::MissingCounterpart(_) | Error::Unbound(_) => Status::MissingCounterpart,
            Error::OrderingViolation { .. } => Status::OrderingViolation,
            Error::Timeout { .. } => Status::Timeout,
            Error::Cancelled => Status::Cancelled,
            Error::InvalidShape(_) | Error::Config(_) => Status::InvalidConfig,
        }
    }

    /// Ordering violations and timeouts go through the reader's recovery policy
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::OrderingViolation { .. } | Error::Timeout { .. })
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Per-call result code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Success = 0,
    OrderingViolation = 1,
    Timeout = 2,
    MissingCounterpart = 3,
    NameCollision = 4,
    Cancelled = 5,
    InvalidConfig = 6,
}

impl Status {
    /// Status of a finished call
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Status::Success
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = Error::NameCollision {
            key: "s.fb".to_string(),
            role: Role::Reader,
        };
        assert_eq!(err.status(), Status::NameCollision);
        assert_eq!(Error::Unbound(Role::Writer).status(), Status::MissingCounterpart);
        assert_eq!(Error::Cancelled.status(), Status::Cancelled);
        assert!(!Error::Cancelled.is_recoverable());
    }

    #[test]
    fn test_status_of_result() {
        let ok: Result<u8> = Ok(1);
        assert!(Status::of(&ok).is_success());

        let err: Result<u8> = Err(Error::Timeout {
            key: "s.fb".to_string(),
            frame: 4,
            timeout_ms: 10,
        });
        assert_eq!(Status::of(&err), Status::Timeout);
        assert!(err.unwrap_err().is_recoverable());
    }

    #[test]
    fn test_error_message() {
        let err = Error::NameCollision {
            key: "graph1.feedback".to_string(),
            role: Role::Writer,
        };
        assert_eq!(
            err.to_string(),
            "another writer is already bound to buffer 'graph1.feedback'"
        );
    }
}
