//! HTTP service for the geo-attendance backend.
//!
//! Exposed as a library so integration tests can build the router.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod middleware;
pub mod routes;
