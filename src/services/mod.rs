pub mod email;
pub mod jwt;

pub use email::EmailService;
pub use jwt::JwtService;
