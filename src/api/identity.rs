use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::tracking::Role;

/// Authenticated caller as attested by the upstream identity provider.
/// Session verification happens upstream; this service trusts the headers.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, "x-user-id")?
            .parse::<Uuid>()
            .map_err(|_| AppError::InvalidInput("x-user-id must be a uuid".to_string()))?;

        let role = match header(parts, "x-user-role")? {
            "customer" => Role::Customer,
            "delivery" | "delivery_agent" => Role::Delivery,
            "restaurant" => Role::Restaurant,
            "admin" => Role::Admin,
            other => return Err(AppError::InvalidInput(format!("unknown role: {other}"))),
        };

        Ok(Identity { user_id, role })
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Forbidden(format!("missing {name} header")))
}
