pub mod password_resets;
pub mod remember_tokens;
pub mod specializations;
pub mod users;
