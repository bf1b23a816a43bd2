//! Error types for the vix crate.

use thiserror::Error;

use crate::codes::{self, ErrorCode};

/// Result type alias for vix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for vix operations.
///
/// Every failure, whether reported by the native library or raised while
/// marshaling values across the boundary, carries one [`ErrorCode`] and the
/// name of the native call it happened in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{op} failed: errorCode={} ({})", .code.value(), .code.name())]
pub struct Error {
    code: ErrorCode,
    op: &'static str,
}

impl Error {
    /// Create an error for `code` raised by `op`.
    pub fn new(code: ErrorCode, op: &'static str) -> Self {
        Self { code, op }
    }

    /// The error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Symbolic name of the error code, or `"unknown"`.
    pub fn name(&self) -> &'static str {
        self.code.name()
    }

    /// Native function (or binding stage) that failed.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Check if the job resolved to `VIX_E_CANCELLED`.
    pub fn is_cancelled(&self) -> bool {
        self.code == codes::VIX_E_CANCELLED
    }

    /// Check if this is a timeout waiting for guest tools.
    pub fn is_timeout(&self) -> bool {
        self.code == codes::VIX_E_TIMEOUT_WAITING_FOR_TOOLS
    }

    /// Check if the native side rejected a handle.
    pub fn is_invalid_handle(&self) -> bool {
        self.code == codes::VIX_E_INVALID_HANDLE || self.is_handle_expired()
    }

    /// Check if a handle the binding still held was rejected, which points at
    /// serial-number expiry inside the native library. Reconnecting is the
    /// usual way out.
    pub fn is_handle_expired(&self) -> bool {
        self.code == codes::VIX_E_BINDING_INVALID_HANDLE_POSSIBLE_SERIALNUMBER_EXPIRY
    }

    /// Check if this was raised by the binding while marshaling properties
    /// rather than reported by the native library.
    pub fn is_marshaling(&self) -> bool {
        matches!(
            self.code,
            codes::VIX_E_BINDING_TOO_MANY_PROPERTIES
                | codes::VIX_E_BINDING_CANNOT_RETURN_UNKNOWN_PROPERTYTYPE
                | codes::VIX_E_BINDING_PROPERTY_TYPE_MISMATCH
                | codes::VIX_E_BINDING_UNRECOGNIZED_PROPERTY
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_embeds_code_and_name() {
        let err = Error::new(codes::VIX_E_VM_NOT_RUNNING, "VixVM_PowerOff");
        assert_eq!(
            err.to_string(),
            "VixVM_PowerOff failed: errorCode=3006 (VIX_E_VM_NOT_RUNNING)"
        );
    }

    #[test]
    fn test_message_unknown_code() {
        let err = Error::new(ErrorCode::from_raw(4242), "VixJob_Wait");
        assert!(err.to_string().contains("errorCode=4242 (unknown)"));
    }

    #[test]
    fn test_predicates() {
        assert!(Error::new(codes::VIX_E_CANCELLED, "x").is_cancelled());
        assert!(Error::new(codes::VIX_E_TIMEOUT_WAITING_FOR_TOOLS, "x").is_timeout());
        let expired = Error::new(
            codes::VIX_E_BINDING_INVALID_HANDLE_POSSIBLE_SERIALNUMBER_EXPIRY,
            "x",
        );
        assert!(expired.is_handle_expired());
        assert!(expired.is_invalid_handle());
        assert!(!expired.is_marshaling());
        assert!(Error::new(codes::VIX_E_BINDING_PROPERTY_TYPE_MISMATCH, "x").is_marshaling());
    }
}
