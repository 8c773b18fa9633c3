mod authenticator;
mod validator;

pub mod cookies;
pub mod dtos;
pub mod guards;
pub mod handlers;
pub mod model;
pub mod roles;
pub mod routes;
pub mod services;

pub use authenticator::{Authenticated, Authenticator};
pub use roles::RoleService;
pub use services::AuthService;
pub use validator::TokenValidator;
