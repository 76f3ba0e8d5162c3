pub mod jwt;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod refresh_token;

pub use middleware::AuthUser;

use sha2::{Digest, Sha256};

/// Hex encoded SHA-256 of a secret handed to a client (refresh token, OTP).
///
/// Only the hash is stored; the plain value never touches the database.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
