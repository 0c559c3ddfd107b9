//! Custom Axum extractors.

pub mod request_context;

pub use request_context::{StudentContext, TenantContext, STUDENT_ID_HEADER, TENANT_ID_HEADER};
