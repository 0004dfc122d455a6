//! # taskmm API Server Library
//!
//! HTTP transport for the taskmm task manager.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Validated request extractors
//! - `middleware`: Guards, rate limiting, security headers, trusted hosts
//! - `response`: Success envelope
//! - `routes`: API route handlers and the route table
//! - `session`: Per-request database transaction

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod session;
