use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use order_payment_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::OrderFlow(e) => order_flow_status(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn order_flow_status(e: &OrderFlowError) -> StatusCode {
    match e {
        OrderFlowError::ValidationError(_) => StatusCode::BAD_REQUEST,
        OrderFlowError::InvalidSignature => StatusCode::BAD_REQUEST,
        OrderFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderFlowError::Forbidden(_) => StatusCode::FORBIDDEN,
        OrderFlowError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
        OrderFlowError::RefundFailed(_) => StatusCode::BAD_GATEWAY,
        OrderFlowError::StorageConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrderFlowError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        e if e.is_conflict() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is invalid. {0}")]
    InvalidToken(String),
    #[error("The server is not configured to validate access tokens.")]
    NotConfigured,
}
