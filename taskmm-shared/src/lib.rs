//! # taskmm Shared Library
//!
//! Domain logic used by the taskmm API server.
//!
//! ## Module Organization
//!
//! - `auth`: tokens, passwords, revocation, role gate and the auth pipeline
//! - `db`: connection pool, migrations and seed data
//! - `models`: users and tasks with their repository operations
//! - `pagination`: cursor and offset listing engines
//! - `redis`: Redis client and rate limiter

pub mod auth;
pub mod db;
pub mod models;
pub mod pagination;
pub mod redis;

/// Current version of the taskmm shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
