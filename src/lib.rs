//! # Userbase Backend Library
//!
//! A small REST backend exposing CRUD operations over a single `users`
//! table stored in an embedded SQLite database.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server, routing and middleware
//! - **SQLx**: asynchronous SQLite access through one shared pool
//! - **Tokio**: async runtime
//! - **Serde**: JSON request and response bodies
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration (defaults, files, environment)
//! - [`db`]: database open, schema, seeding and avatar backfill
//! - [`avatar`]: avatar URL derivation
//! - [`error`]: error taxonomy and HTTP error responses
//! - [`middleware`]: API key check and payload validation
//! - [`routes`]: HTTP handlers and router assembly
//! - [`state`]: shared application state
//! - [`types`]: the user model and request/response types

pub mod avatar;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
