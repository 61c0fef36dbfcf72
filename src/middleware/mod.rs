pub mod auth_redirect;
pub mod remember_login;
pub mod session_guard;
