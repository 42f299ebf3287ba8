use thiserror::Error;

/// Failures surfaced by the channel and session layers.
///
/// The credential injector never produces one of these: anything the
/// forwarded call fails with is handed back untouched.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid bearer token: {0}")]
    InvalidToken(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Status(#[from] tonic::Status),

    #[error("failed to decode result batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("query returned no rows")]
    EmptyResult,
}

impl ClientError {
    pub(crate) fn connection_string(msg: impl Into<String>) -> Self {
        ClientError::InvalidConnectionString(msg.into())
    }

    /// gRPC status code when the failure came back from the server.
    pub fn code(&self) -> Option<tonic::Code> {
        match self {
            ClientError::Status(s) => Some(s.code()),
            _ => None,
        }
    }
}
