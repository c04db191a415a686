//! Request identity extracted once by the auth middleware and carried in
//! request extensions. Handlers take `Identity` as an extractor argument
//! instead of re-parsing headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// The authenticated caller: who they are, which tenant they act in, and
/// whether the edge granted them the elevated (supervisor) role.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub elevated: bool,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}
