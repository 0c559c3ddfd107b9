//! Identity headers set by the upstream auth gateway.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const STUDENT_ID_HEADER: &str = "x-student-id";

fn uuid_header(parts: &Parts, name: &str) -> Result<Uuid, ApiError> {
    let value = parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", name)))?;

    Uuid::parse_str(value.trim())
        .map_err(|_| ApiError::Unauthorized(format!("Malformed {} header", name)))
}

/// Tenant scope of an administrative request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            tenant_id: uuid_header(parts, TENANT_ID_HEADER)?,
        })
    }
}

/// Student submitting location samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentContext {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for StudentContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = Self {
            tenant_id: uuid_header(parts, TENANT_ID_HEADER)?,
            student_id: uuid_header(parts, STUDENT_ID_HEADER)?,
        };
        parts.extensions.insert(context);
        Ok(context)
    }
}
