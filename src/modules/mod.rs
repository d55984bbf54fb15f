pub mod keys;
pub mod login;
pub mod token;
pub mod totp;
pub mod verify;

pub use self::login::model::LoginRequest;
pub use self::token::model::AccessClaims;
