//! Authentication
//!
//! Password hashing and server-side sessions.

pub mod password;
pub mod session;

pub use password::PasswordHasher;
pub use session::{generate_token, hash_token, IssuedSession, SessionService};
