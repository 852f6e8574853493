use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// 32 random bytes from the OS CSPRNG, hex-encoded.
///
/// Used for refresh, session, verification and reset tokens.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hash a token for safe database storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
