use super::state::ServerState;
use crate::admin_keys::AdminContext;
use crate::mcp::protocol::{McpError, McpResponse, RequestId};

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::debug;

pub const HEADER_API_KEY: &str = "X-API-Key";
pub const HEADER_AUTHORIZATION: &str = "Authorization";

pub enum AdminExtractionError {
    Unauthenticated,
}

impl IntoResponse for AdminExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminExtractionError::Unauthenticated => {
                // The request never reached the dispatcher, so there is no
                // trustworthy id to echo.
                let envelope =
                    McpResponse::error(Some(RequestId::Null), McpError::Unauthenticated);
                (StatusCode::UNAUTHORIZED, Json(envelope)).into_response()
            }
        }
    }
}

fn extract_credential_from_headers(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(HEADER_API_KEY) {
        return value.to_str().ok().map(|s| s.to_string());
    }

    parts
        .headers
        .get(HEADER_AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

impl FromRequestParts<ServerState> for AdminContext {
    type Rejection = AdminExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let credential = match extract_credential_from_headers(parts) {
            Some(credential) => credential,
            None => {
                debug!("No API key in headers.");
                return Err(AdminExtractionError::Unauthenticated);
            }
        };

        ctx.auth_guard.authenticate(&credential).map_err(|e| {
            debug!("Authentication failed: {}", e);
            AdminExtractionError::Unauthenticated
        })
    }
}
