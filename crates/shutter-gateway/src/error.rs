//! Error types for the gateway module.

use thiserror::Error;

/// Errors that can occur talking to external services.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The camera authorization query did not produce an answer.
    ///
    /// Distinct from an unauthorized camera, which is a normal result.
    /// The underlying failure is kept as the source, so a timeout still
    /// reads as [`GatewayError::TransportFailed`].
    #[error("authorization query failed for {camera_id}: {source}")]
    AuthorizationQueryFailed {
        camera_id: String,
        #[source]
        source: Box<GatewayError>,
    },

    /// The request never completed: connect failure, reset, or timeout.
    #[error("{call}: transport failed: {reason}")]
    TransportFailed { call: &'static str, reason: String },

    /// The service answered with a non-success status.
    #[error("{call}: http {status}: {body}")]
    Status {
        call: &'static str,
        status: u16,
        body: String,
    },

    /// The service answered with a body of an unexpected shape.
    #[error("{call}: unexpected response: {reason}")]
    ResponseShape { call: &'static str, reason: String },

    /// The HTTP client could not be built.
    #[error("client setup: {0}")]
    Setup(String),
}

impl GatewayError {
    /// Name of the external call that failed.
    pub fn call(&self) -> &'static str {
        match self {
            Self::AuthorizationQueryFailed { .. } => "getCameraInfo",
            Self::TransportFailed { call, .. }
            | Self::Status { call, .. }
            | Self::ResponseShape { call, .. } => call,
            Self::Setup(_) => "setup",
        }
    }

    /// Whether the request never completed, looking through the
    /// authorization wrapper.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::TransportFailed { .. } => true,
            Self::AuthorizationQueryFailed { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_authorization_failure_keeps_transport_source() {
        let err = GatewayError::AuthorizationQueryFailed {
            camera_id: "0xab".into(),
            source: Box::new(GatewayError::TransportFailed {
                call: "getCameraInfo",
                reason: "timed out after 30s".into(),
            }),
        };
        assert!(err.is_transport());
        assert_eq!(err.call(), "getCameraInfo");
        assert!(err.to_string().contains("timed out after 30s"));
        assert!(err.source().is_some());

        let shape = GatewayError::AuthorizationQueryFailed {
            camera_id: "0xab".into(),
            source: Box::new(GatewayError::ResponseShape {
                call: "getCameraInfo",
                reason: "missing output".into(),
            }),
        };
        assert!(!shape.is_transport());
    }
}
