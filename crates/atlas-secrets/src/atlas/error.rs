use thiserror::Error;

/// Failure reported by the remote account-management API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtlasError {
    /// The resource does not exist (HTTP 404)
    #[error("{resource} not found")]
    NotFound {
        /// What was looked up
        resource: String,
    },

    /// Any other non-success response
    #[error("Atlas API returned {status}: {detail}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error detail from the response body
        detail: String,
    },

    /// Request never produced a response
    #[error("Atlas transport error: {0}")]
    Transport(String),

    /// Response was successful but unusable
    #[error("Unexpected Atlas response: {0}")]
    UnexpectedResponse(String),
}

impl AtlasError {
    /// Shorthand for [`AtlasError::NotFound`]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Shorthand for [`AtlasError::Api`]
    pub fn api(status: u16, detail: impl Into<String>) -> Self {
        Self::Api {
            status,
            detail: detail.into(),
        }
    }

    /// Whether the failure means the resource is already gone.
    ///
    /// Rollback treats this as success.
    pub fn is_not_found(&self) -> bool {
        match self {
            AtlasError::NotFound { .. } => true,
            AtlasError::Api { status, .. } => *status == 404,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(AtlasError::not_found("user").is_not_found());
        assert!(AtlasError::api(404, "gone").is_not_found());
        assert!(!AtlasError::api(500, "boom").is_not_found());
        assert!(!AtlasError::Transport("reset".into()).is_not_found());
    }
}
