pub mod middleware;
pub mod password;
pub mod session;

pub use middleware::AuthenticatedUser;

/// Name of the HttpOnly cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";
