use serde::Serialize;

use crate::cache::LocalStoreError;
use crate::config::AppConfigError;
use crate::remote::RemoteError;

/// Coarse classification used when surfacing an error to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, rejected before any state change.
    Validation,
    /// Local state was applied; the upstream write did not land.
    RemoteWrite,
    /// Remote or imported data did not have the expected shape.
    ShapeCorruption,
    NotFound,
    Internal,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Remote write failed: {0}")]
    RemoteWriteFailed(String),

    #[error("Malformed remote data: {0}")]
    MalformedRemoteData(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::Conflict(_) | Self::Forbidden(_) => {
                ErrorKind::Validation
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RemoteWriteFailed(_) => ErrorKind::RemoteWrite,
            Self::MalformedRemoteData(_) => ErrorKind::ShapeCorruption,
            Self::StorageError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Text for the operator-facing notification. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::ValidationError(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Forbidden(msg) => msg.clone(),
            Self::RemoteWriteFailed(_) => {
                "Saved locally, but the change could not be sent to the shared store".to_string()
            }
            Self::MalformedRemoteData(_) => {
                "Ignored an update from the shared store that could not be read".to_string()
            }
            Self::StorageError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Internal error".to_string(),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<RemoteError> for ServiceError {
    fn from(err: RemoteError) -> Self {
        ServiceError::RemoteWriteFailed(err.to_string())
    }
}

impl From<LocalStoreError> for ServiceError {
    fn from(err: LocalStoreError) -> Self {
        ServiceError::StorageError(err.to_string())
    }
}

impl From<AppConfigError> for ServiceError {
    fn from(err: AppConfigError) -> Self {
        ServiceError::InternalError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(ServiceError::Conflict("dup".into()).kind(), ErrorKind::Validation);
        assert_eq!(ServiceError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            ServiceError::RemoteWriteFailed("net".into()).kind(),
            ErrorKind::RemoteWrite
        );
        assert_eq!(
            ServiceError::MalformedRemoteData("bad".into()).kind(),
            ErrorKind::ShapeCorruption
        );
    }

    #[test]
    fn internal_details_are_not_user_facing() {
        let err = ServiceError::StorageError("/var/lib/cache: permission denied".into());
        assert_eq!(err.user_message(), "Internal error");
        let err = ServiceError::ValidationError("Item name is empty".into());
        assert_eq!(err.user_message(), "Item name is empty");
    }
}
