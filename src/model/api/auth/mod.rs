mod request;
mod rights;
mod token;

pub use request::LoginRequest;
pub use rights::{Access, Admin, AnyUser};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
