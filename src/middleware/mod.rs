//! Façade middleware: rate limiting and the security headers applied to
//! every response. Both are plain `axum::middleware::from_fn[_with_state]`
//! layers, mirroring the teacher's `auth_middleware` shape minus the
//! authentication/authorization concern the spec excludes as a non-goal.

mod rate_limit;
mod security_headers;

pub use rate_limit::rate_limit_middleware;
pub use security_headers::security_headers_middleware;
