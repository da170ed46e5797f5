//! Middleware components for HTTP request processing.
//!
//! - `auth`: shared-secret header check for the user routes
//! - `validation`: user payload validation ahead of the handlers

pub mod auth;
pub mod validation;
