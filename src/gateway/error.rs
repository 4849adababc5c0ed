use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::gateway::provider::ProviderError;

pub const INVALID_MESSAGES: &str = "Invalid messages format";
pub const CONFIGURATION_ERROR: &str = "Server configuration error";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Failures of the chat route. Callers only ever see the fixed diagnostic
/// string; the detail goes to the log.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request body: {0}")]
    InvalidMessages(#[source] serde_json::Error),
    #[error("provider credentials are not configured")]
    MissingConfiguration,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidMessages(_) => StatusCode::BAD_REQUEST,
            GatewayError::MissingConfiguration | GatewayError::Provider(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::InvalidMessages(_) => INVALID_MESSAGES,
            GatewayError::MissingConfiguration => CONFIGURATION_ERROR,
            GatewayError::Provider(_) => INTERNAL_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::InvalidMessages(_) => warn!("rejected chat request: {self}"),
            _ => error!("chat request failed: {self}"),
        }
        (self.status(), self.public_message()).into_response()
    }
}
