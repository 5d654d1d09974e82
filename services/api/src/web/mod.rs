pub mod admin;
pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

pub use middleware::{require_admin, require_auth};
pub use rest::ApiDoc;
