use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IamError {
    /// The provider has no such entity (user, key, policy attachment, ...)
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Throttled even after the client's own retries
    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Service error {code}: {message}")]
    Service { code: String, message: String },

    /// Dispatch, timeout or credential failure before a service response
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response missing a field the caller depends on
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl IamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IamError::NotFound(_))
    }

    /// Map a provider error code (e.g. `NoSuchEntity`) to a variant.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "NoSuchEntity" | "NoSuchEntityException" => IamError::NotFound(message),
            "AccessDenied" | "AccessDeniedException" | "UnauthorizedOperation" => {
                IamError::AccessDenied(message)
            }
            "Throttling" | "ThrottlingException" | "TooManyRequestsException" | "RequestLimitExceeded" => {
                IamError::Throttled(message)
            }
            _ => IamError::Service {
                code: code.to_string(),
                message,
            },
        }
    }
}
