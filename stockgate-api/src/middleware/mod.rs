//! Request middleware: authentication and abuse gating.

pub mod auth;
pub mod rate_limit;

pub use auth::{
    auth_middleware, resolve_client_ip, AuthState, BearerToken, ClientIp, IdentityVerifier,
    PrincipalExtractor, StaticTokenVerifier,
};
pub use rate_limit::{
    broad_window_middleware, denylist_middleware, stock_window_middleware, RateLimitState,
};
