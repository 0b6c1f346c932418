//! Service error types.

use domain::{ErrorKind, OrderError};
use store::StoreError;
use thiserror::Error;

/// Errors returned by the order transaction core.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The caller exceeded the request rate for an operation.
    #[error("Too many {operation} requests")]
    RateLimited { operation: &'static str },

    /// Every generated order number collided with an existing one.
    #[error("Could not generate a unique order number after {attempts} attempts")]
    OrderNumberGenerationFailed { attempts: u32 },

    /// The transaction kept conflicting with concurrent ones.
    #[error("Transaction retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// A collaborating service failed.
    #[error("{service} service error: {reason}")]
    Collaborator {
        service: &'static str,
        reason: String,
    },

    /// A required collaborator was not supplied.
    #[error("Missing required collaborator: {0}")]
    NotConfigured(&'static str),
}

impl ServiceError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Order(err) => err.kind(),
            ServiceError::RateLimited { .. } => ErrorKind::RateLimited,
            ServiceError::Store(_)
            | ServiceError::OrderNumberGenerationFailed { .. }
            | ServiceError::RetriesExhausted { .. }
            | ServiceError::Collaborator { .. }
            | ServiceError::NotConfigured(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the whole transaction may be run again.
    pub fn is_serialization_failure(&self) -> bool {
        matches!(self, ServiceError::Store(err) if err.is_serialization_failure())
    }

    pub(crate) fn collaborator(service: &'static str, reason: impl Into<String>) -> Self {
        ServiceError::Collaborator {
            service,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::VariantId;

    #[test]
    fn test_kinds_follow_domain_errors() {
        let err = ServiceError::from(OrderError::VariantNotFound {
            variant_id: VariantId::new(),
        });
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            ServiceError::RateLimited {
                operation: "create"
            }
            .kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            ServiceError::OrderNumberGenerationFailed { attempts: 5 }.kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_serialization_failure_detection() {
        assert!(ServiceError::from(StoreError::SerializationFailure).is_serialization_failure());
        assert!(!ServiceError::from(OrderError::EmptyItems).is_serialization_failure());
    }
}
