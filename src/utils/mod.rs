//! Utility modules for the Authgate API.
//!
//! - [`clock`]: Injectable time source for cache expiry
//! - [`email`]: One-time-code delivery over SMTP
//! - [`errors`]: Application error types and handling
//! - [`http`]: Request-context and header extraction

pub mod clock;
pub mod email;
pub mod errors;
pub mod http;
