pub mod auth;
pub mod rate_limit;

pub use auth::{require_browser_session, require_service_session};
pub use rate_limit::SharedRateLimitLayer;
