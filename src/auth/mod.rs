pub mod credentials;
pub mod password;
pub mod remember;
pub mod tokens;
