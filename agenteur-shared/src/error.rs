/// Core error taxonomy
///
/// Every failure raised by the services is a [`CoreError`]. Each variant is
/// tagged with an [`ErrorCategory`] that callers map to their transport
/// (the API maps categories to HTTP status codes and machine-readable codes).
///
/// Absent and expired resources share the `NotFound` category on purpose so
/// callers cannot probe which one they hit.

use crate::{
    auth::{authorization::AuthzError, password::PasswordError},
    notifier::NotifierError,
    store::StoreError,
};

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification of a [`CoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input, never retried
    Validation,

    /// Uniqueness or state conflict
    Conflict,

    /// Missing or invalid credential
    Unauthorized,

    /// Valid credential without sufficient privilege
    Forbidden,

    /// Absent or expired resource
    NotFound,

    /// Caller cancelled or deadline elapsed before completion
    Cancelled,

    /// Store, cryptography or delivery failure
    Internal,
}

impl ErrorCategory {
    /// Machine-readable code exposed to clients
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "VALIDATION_ERROR",
            ErrorCategory::Conflict => "CONFLICT",
            ErrorCategory::Unauthorized => "UNAUTHORIZED",
            ErrorCategory::Forbidden => "FORBIDDEN",
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::Cancelled => "REQUEST_CANCELLED",
            ErrorCategory::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Errors returned by core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Input failed a domain rule
    #[error("{message}")]
    Validation { field: String, message: String },

    /// Signup with an email that is already registered
    #[error("Email already registered")]
    EmailExists,

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Refresh token unknown, consumed, expired or orphaned
    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    /// Access token missing, malformed, expired or for a vanished user
    #[error("Unauthorized")]
    InvalidToken,

    /// Authorization gate rejected the principal
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    /// Resource does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Membership to remove does not exist
    #[error("Member not found")]
    MemberNotFound,

    /// Removing the member would leave the organization without an admin
    #[error("Cannot remove the last admin")]
    LastAdmin,

    /// User already belongs to the organization
    #[error("User is already a member")]
    AlreadyMember,

    /// A live pending invitation already exists for this email
    #[error("Invitation already pending for this email")]
    InvitationExists,

    /// Invitation absent, already accepted or expired
    #[error("Invitation not found or expired")]
    InvitationNotFound,

    /// Accepting user's email differs from the invited address
    #[error("Email does not match invitation")]
    EmailMismatch,

    /// Cancelled or timed out before completion; nothing was committed
    #[error("Request cancelled")]
    Cancelled,

    /// Password hashing failure
    #[error("Password operation failed: {0}")]
    Password(#[from] PasswordError),

    /// Invitation could not be delivered
    #[error("Notification failed: {0}")]
    Notification(#[from] NotifierError),

    /// Persistence failure
    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),

    /// Any other internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Builds a validation error for a single field
    pub fn validation(field: &str, message: &str) -> Self {
        CoreError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Category used for transport mapping
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Validation { .. } | CoreError::LastAdmin => ErrorCategory::Validation,
            CoreError::EmailExists
            | CoreError::AlreadyMember
            | CoreError::InvitationExists => ErrorCategory::Conflict,
            CoreError::InvalidCredentials
            | CoreError::InvalidRefreshToken
            | CoreError::InvalidToken => ErrorCategory::Unauthorized,
            CoreError::Forbidden(_) | CoreError::EmailMismatch => ErrorCategory::Forbidden,
            CoreError::NotFound(_)
            | CoreError::MemberNotFound
            | CoreError::InvitationNotFound => ErrorCategory::NotFound,
            CoreError::Cancelled => ErrorCategory::Cancelled,
            CoreError::Password(_)
            | CoreError::Notification(_)
            | CoreError::Store(_)
            | CoreError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// True for errors whose message must not reach clients
    pub fn is_internal(&self) -> bool {
        self.category() == ErrorCategory::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(CoreError::EmailExists.category(), ErrorCategory::Conflict);
        assert_eq!(CoreError::InvalidCredentials.category(), ErrorCategory::Unauthorized);
        assert_eq!(CoreError::InvalidRefreshToken.category(), ErrorCategory::Unauthorized);
        assert_eq!(CoreError::LastAdmin.category(), ErrorCategory::Validation);
        assert_eq!(CoreError::EmailMismatch.category(), ErrorCategory::Forbidden);
        assert_eq!(CoreError::InvitationNotFound.category(), ErrorCategory::NotFound);
        assert_eq!(CoreError::Cancelled.category(), ErrorCategory::Cancelled);
        assert!(CoreError::Internal("boom".to_string()).is_internal());
    }

    #[test]
    fn test_forbidden_from_authz() {
        let err: CoreError = AuthzError::NotSuperadmin.into();
        assert_eq!(err.category(), ErrorCategory::Forbidden);
        assert_eq!(err.category().code(), "FORBIDDEN");
    }

    #[test]
    fn test_validation_message() {
        let err = CoreError::validation("name", "Name is required");
        assert_eq!(err.to_string(), "Name is required");
        assert_eq!(err.category().code(), "VALIDATION_ERROR");
    }
}
