//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded into the span opened by `TraceLayer`)
//! 4. Rate limiting on `/api/*` auth endpoints (governor)

pub mod rate_limit;
pub mod request_id;

pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
