use thiserror::Error;

use crate::auth::token::SecurityError;
use crate::crypto::EncryptionError;
use health_bridge_data::repository::RepositoryError;

/// Error returned by every domain service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller is not authenticated or presented bad credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed to do this
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request conflicts with the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment gateway declined the charge
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether retrying the same operation later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Repository(_) | ServiceError::Encryption(_) | ServiceError::Internal(_)
        )
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        ServiceError::NotFound(format!("{} {} not found", kind, id))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(message) => ServiceError::NotFound(message),
            RepositoryError::Conflict(message) => ServiceError::Conflict(message),
            RepositoryError::Validation(message) => ServiceError::Validation(message),
            other => ServiceError::Repository(other),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let reasons: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, reasons.join(", "))
            })
            .collect();
        messages.sort();
        ServiceError::Validation(messages.join("; "))
    }
}

impl From<SecurityError> for ServiceError {
    fn from(error: SecurityError) -> Self {
        match error {
            SecurityError::ConfigError(message) | SecurityError::Encoding(message) => {
                ServiceError::Internal(message)
            }
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "too short"))]
        name: String,
    }

    #[test]
    fn test_repository_errors_map_to_service_errors() {
        assert!(matches!(
            ServiceError::from(RepositoryError::NotFound("x".into())),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::Conflict("x".into())),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::Validation("x".into())),
            ServiceError::Validation(_)
        ));
    }

    #[test]
    fn test_validation_errors_are_flattened() {
        let err: ServiceError = Sample { name: "ab".into() }.validate().unwrap_err().into();
        match err {
            ServiceError::Validation(message) => assert_eq!(message, "name: too short"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ServiceError::Internal("db".into()).is_retryable());
        assert!(!ServiceError::Forbidden("no".into()).is_retryable());
        assert!(!ServiceError::Conflict("dup".into()).is_retryable());
    }
}
