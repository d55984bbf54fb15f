//! Configuration modules for the Authgate API.
//!
//! Each submodule handles a specific aspect of configuration, typically
//! loaded from environment variables with sensible defaults.
//!
//! - [`cors`]: CORS (Cross-Origin Resource Sharing) configuration
//! - [`database`]: PostgreSQL database connection pool initialization
//! - [`email`]: Email/SMTP configuration for one-time-code delivery
//! - [`service`]: Token service settings (domain, providers, lifetimes)

pub mod cors;
pub mod database;
pub mod email;
pub mod service;
