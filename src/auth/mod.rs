//! Authentication module for ProfileVault
//!
//! - Password hashing and credential verification
//! - JWT access/refresh token generation and validation
//! - Refresh-token sessions with rotation and revocation

mod jwt;
mod password;
mod session;

pub use jwt::{Claims, JwtError, TokenKeys, TokenType};
pub use password::{verify_password, PasswordError, PasswordHasher};
pub use session::{SessionError, SessionManager};
