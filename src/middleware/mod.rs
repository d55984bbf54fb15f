//! Middleware and extractors for cross-cutting request concerns.
//!
//! - [`auth`]: verified-token extractor, delegated authorization, and the
//!   decision cache

pub mod auth;
