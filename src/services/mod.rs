//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They own hashing, quota decisions, and key administration; storage is
//! reached only through the traits in [`crate::store`].

pub mod key_admin;
pub mod key_store;
pub mod rate_limiter;
