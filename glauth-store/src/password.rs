/// Password digests for the `passsha256` column
///
/// glauth compares binds against a lowercase hex SHA-256 of the password, so
/// that is all this module produces. Verification happens in glauth, not here.
///
/// # Example
///
/// ```
/// use glauth_store::password::sha256_hex;
///
/// let digest = sha256_hex("dogood");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, sha256_hex("dogood"));
/// ```

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `password`
pub fn sha256_hex(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
