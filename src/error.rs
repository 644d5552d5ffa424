/// Boxed cause carried by the stage-labelled error variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the credential-resolution core.
///
/// Each variant names the stage that failed. Remote failures keep the
/// underlying cause as their `source()`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("unable to load SDK config: {0}")]
    ConfigLoadFailed(String),
    #[error("failed to retrieve credentials: {0}")]
    CredentialRetrievalFailed(String),
    #[error("invalid role ARN '{0}': must be a valid AWS IAM role ARN")]
    InvalidRoleArn(String),
    #[error("failed to assume role")]
    AssumeRoleFailed(#[source] BoxError),
    #[error("failed to list accounts")]
    ListAccountsFailed(#[source] BoxError),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// True when the operation stopped because the caller cancelled it or
    /// its deadline passed, either directly or as the wrapped cause.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Error::Cancelled | Error::DeadlineExceeded => true,
            Error::AssumeRoleFailed(cause) | Error::ListAccountsFailed(cause) => cause
                .downcast_ref::<Error>()
                .is_some_and(Error::is_cancellation),
            _ => false,
        }
    }
}
