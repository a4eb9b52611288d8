//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response bodies of the admin API.

/// API key records, roles, and admin request/response types
pub mod api_key;
/// Rate limit hit records
pub mod rate_limit;
