/// Middleware modules for the API server
///
/// - `auth`: token and role guards applied per route
/// - `rate_limit`: per-client sliding-window limiter
/// - `security`: security response headers
/// - `trusted_host`: `Host` header allow list

pub mod auth;
pub mod rate_limit;
pub mod security;
pub mod trusted_host;
