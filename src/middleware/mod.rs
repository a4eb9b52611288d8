//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Enforce roles and quotas
//! - Short-circuit requests (reject unauthorized or throttled callers)

/// API key authentication, role, and rate limit gate
pub mod auth;
