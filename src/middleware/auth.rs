//! Identity middleware. The edge gateway terminates authentication and
//! forwards the verified principal in headers; this layer parses them
//! into an [`Identity`] and rejects requests missing one.

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Identity;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const ELEVATED_ROLE_HEADER: &str = "x-elevated-role";

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>, AppError> {
    let Some(raw) = headers.get(name) else {
        return Ok(None);
    };
    let text = raw
        .to_str()
        .map_err(|_| AppError::Validation(format!("{name} is not valid ascii")))?;
    let id = Uuid::parse_str(text)
        .map_err(|_| AppError::Validation(format!("{name} is not a valid uuid")))?;
    Ok(Some(id))
}

/// Parse the identity headers. Missing user is an authentication failure;
/// an authenticated user with no tenant context is a malformed request.
pub fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, AppError> {
    let user_id = header_uuid(headers, USER_ID_HEADER)?.ok_or(AppError::Unauthorized)?;
    let tenant_id = header_uuid(headers, TENANT_ID_HEADER)?.ok_or(AppError::TenantContextMissing)?;
    let elevated = headers
        .get(ELEVATED_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);
    Ok(Identity {
        user_id,
        tenant_id,
        elevated,
    })
}

/// Middleware that stores the parsed [`Identity`] in request extensions.
pub async fn identity_middleware(
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, AppError> {
    let identity = identity_from_headers(req.headers())?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
