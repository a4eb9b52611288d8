//! API key gate - authentication and per-key rate limiting for HTTP services.
//!
//! Every protected request passes through one gate that resolves the
//! `X-API-Key` credential, checks the route's role requirement, and admits
//! the request against the key's sliding one-minute quota.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing
//! - **Format**: JSON requests/responses

pub mod app;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
