//! Error types for the windns system
//!
//! Failures fall into four families:
//!
//! - **Validation**: an operation option was missing or unusable. Never reaches the network.
//! - **Transport**: the remote command could not be reached, authenticated or run
//!   ([`Error::Connection`], [`Error::Authentication`], [`Error::Timeout`],
//!   [`Error::Exit`], [`Error::Protocol`]).
//! - **Decode**: the command ran but its standard output was not a well-formed envelope.
//! - **Domain**: the command ran and answered with a non-200 envelope
//!   ([`Error::NotFound`], [`Error::Conflict`], [`Error::RemoteFault`], [`Error::Remote`]).
//!
//! Callers that need idempotent behavior branch on the domain family; nothing in
//! this crate retries.

use std::fmt;
use thiserror::Error;

/// Result type alias for windns operations
pub type Result<T> = std::result::Result<T, Error>;

/// One address-level change applied to a record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressChange {
    /// The address was added
    Added(String),
    /// The address was removed
    Removed(String),
}

impl fmt::Display for AddressChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressChange::Added(addr) => write!(f, "+{}", addr),
            AddressChange::Removed(addr) => write!(f, "-{}", addr),
        }
    }
}

/// Core error type for the windns system
#[derive(Error, Debug)]
pub enum Error {
    /// A required operation option was missing or unusable
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The remote endpoint could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The remote endpoint rejected our credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote execution did not finish within the session timeout
    #[error("Operation timed out after {seconds}s")]
    Timeout {
        /// Timeout that elapsed, in seconds
        seconds: u64,
    },

    /// The remote process exited non-zero without producing an envelope
    #[error("exit code {status}: {stderr}")]
    Exit {
        /// Process exit status
        status: i32,
        /// Captured standard error
        stderr: String,
    },

    /// The remote-execution protocol itself failed (fault, malformed reply)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Standard output was not a well-formed envelope
    #[error("Decode error: {0}")]
    Decode(String),

    /// Envelope code 404
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Envelope code 400
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Envelope code 500
    #[error("Remote fault: {0}")]
    RemoteFault(String),

    /// Any other non-200 envelope code
    #[error("Remote error ({code}): {detail}")]
    Remote {
        /// Envelope code
        code: i64,
        /// Remote-reported detail, verbatim
        detail: String,
    },

    /// A bulk record-set operation stopped at its first failure
    #[error(
        "{operation} failed for address {failed_address} after {} applied change(s): {source}",
        applied.len()
    )]
    PartiallyApplied {
        /// Record-set operation name ("create", "update", "delete")
        operation: &'static str,
        /// Changes that were applied before the failure, in order
        applied: Vec<AddressChange>,
        /// The address whose sub-operation failed
        failed_address: String,
        /// The failure itself
        #[source]
        source: Box<Error>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Map a non-200 envelope onto its domain error
    pub fn from_envelope(code: i64, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match code {
            404 => Self::NotFound(detail),
            400 => Self::Conflict(detail),
            500 => Self::RemoteFault(detail),
            _ => Self::Remote { code, detail },
        }
    }

    /// Whether the remote command could not be reached or run
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Authentication(_)
                | Self::Timeout { .. }
                | Self::Exit { .. }
                | Self::Protocol(_)
        )
    }

    /// Whether the remote command ran and answered "no"
    pub fn is_domain(&self) -> bool {
        self.domain_code().is_some()
    }

    /// The envelope code behind a domain error
    pub fn domain_code(&self) -> Option<i64> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(400),
            Self::RemoteFault(_) => Some(500),
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this is a not-found domain error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_codes_map_to_domain_errors() {
        assert!(matches!(Error::from_envelope(404, "record not found"), Error::NotFound(_)));
        assert!(matches!(Error::from_envelope(400, "record already exists"), Error::Conflict(_)));
        assert!(matches!(Error::from_envelope(500, "boom"), Error::RemoteFault(_)));

        let other = Error::from_envelope(418, "teapot");
        assert_eq!(other.domain_code(), Some(418));
        assert!(other.is_domain());
        assert!(!other.is_transport());
    }

    #[test]
    fn test_transport_family() {
        let exit = Error::Exit {
            status: 1,
            stderr: "access denied".to_string(),
        };
        assert!(exit.is_transport());
        assert!(!exit.is_domain());
        assert_eq!(exit.to_string(), "exit code 1: access denied");

        assert!(Error::Timeout { seconds: 60 }.is_transport());
        assert!(!Error::validation("x").is_transport());
    }

    #[test]
    fn test_partially_applied_message() {
        let err = Error::PartiallyApplied {
            operation: "update",
            applied: vec![AddressChange::Removed("10.0.0.1".to_string())],
            failed_address: "10.0.0.3".to_string(),
            source: Box::new(Error::from_envelope(400, "record already exists")),
        };

        let msg = err.to_string();
        assert!(msg.contains("10.0.0.3"));
        assert!(msg.contains("1 applied change(s)"));
        assert!(msg.contains("record already exists"));
    }
}
