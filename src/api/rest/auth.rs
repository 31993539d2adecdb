use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::booking::CancelledBy;
use crate::state::AppState;

/// Identity forwarded by the gateway. The service trusts these headers
/// because it is only reachable from behind the gateway; internal
/// endpoints additionally require the service token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

impl Role {
    pub fn as_cancelled_by(self) -> CancelledBy {
        match self {
            Role::Passenger => CancelledBy::Passenger,
            Role::Driver => CancelledBy::Driver,
            Role::Admin => CancelledBy::System,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing identity headers".to_string()))?
            .to_string();

        let role = match parts.headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
            None => Role::Passenger,
            Some("passenger") => Role::Passenger,
            Some("driver") => Role::Driver,
            Some("admin") => Role::Admin,
            Some(other) => {
                return Err(AppError::Unauthorized(format!("unknown role: {other}")));
            }
        };

        Ok(Caller { user_id, role })
    }
}

/// Marker extractor for service-to-service endpoints.
pub struct ServiceAuth;

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for ServiceAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("x-service-token")
            .and_then(|value| value.to_str().ok());

        if token != Some(state.config.service_token.as_str()) {
            return Err(AppError::Forbidden("invalid service token".to_string()));
        }
        Ok(ServiceAuth)
    }
}
