mod password_reset;
mod remember_token;
mod specialization;
mod user;

pub use password_reset::PasswordReset;
pub use remember_token::RememberToken;
pub use specialization::Specialization;
pub use user::User;
