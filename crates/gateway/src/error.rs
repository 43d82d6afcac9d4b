use {
    axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    sesh_sessions::RegistryError,
};

/// Anything a session endpoint can answer with besides success.
///
/// Bodies are plain text, one line, terminated by `\n`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or incomplete request body. Never reaches the registry.
    #[error("{0}")]
    BadRequest(String),

    #[error("Not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Registry(RegistryError::NotFound(_)) => StatusCode::BAD_REQUEST,
            Self::Registry(RegistryError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Registry(RegistryError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Registry(RegistryError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, format!("{self}\n")).into_response()
    }
}
