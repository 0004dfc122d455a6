/// Host header allow list
///
/// Patterns are exact host names, `*` (anything) or `*.example.com`, which
/// matches any subdomain of `example.com` but not `example.com` itself. The
/// port is ignored and matching is case-insensitive.

use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Compiled list of accepted hosts
#[derive(Debug, Clone)]
pub struct TrustedHosts {
    patterns: Arc<[String]>,
    allow_any: bool,
}

impl TrustedHosts {
    pub fn new(patterns: &[String]) -> Self {
        let patterns: Vec<String> = patterns.iter().map(|p| p.trim().to_ascii_lowercase()).collect();
        let allow_any = patterns.iter().any(|p| p == "*");

        Self {
            patterns: patterns.into(),
            allow_any,
        }
    }

    pub fn allows_any(&self) -> bool {
        self.allow_any
    }

    /// Whether `host` (with or without a port) is accepted
    pub fn is_trusted(&self, host: &str) -> bool {
        if self.allow_any {
            return true;
        }

        let host = strip_port(host).to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }

        self.patterns.iter().any(|pattern| match pattern.strip_prefix("*.") {
            Some(domain) => host
                .strip_suffix(domain)
                .is_some_and(|rest| rest.len() > 1 && rest.ends_with('.')),
            None => *pattern == host,
        })
    }
}

fn strip_port(host: &str) -> &str {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[') {
        // IPv6 literal, e.g. [::1]:8080
        return rest.split(']').next().unwrap_or_default();
    }
    host.split(':').next().unwrap_or_default()
}

/// Rejects requests whose `Host` is not trusted with 400
pub async fn trusted_host_middleware(
    State(hosts): State<TrustedHosts>,
    request: Request,
    next: Next,
) -> Response {
    if hosts.allows_any() {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().host().map(str::to_string))
        .unwrap_or_default();

    if !hosts.is_trusted(&host) {
        tracing::warn!(host = %host, "Rejected untrusted host");
        return ApiError::BadRequest("Invalid host header".to_string()).into_response();
    }

    next.run(request).await
}
