//! Password hashing and verification (bcrypt).

use thiserror::Error;

/// Work factor for new hashes.
pub const BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Hash a password with a fresh random salt embedded in the digest.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

/// Verify a password against a stored digest.
///
/// bcrypt compares in constant time. A malformed digest counts as a mismatch:
/// callers only ever need a yes/no, and a corrupt row must not log anyone in.
pub fn verify_password(password: &str, digest: &str) -> bool {
    match bcrypt::verify(password, digest) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(error = %e, "stored password digest could not be parsed");
            false
        }
    }
}

/// Burn roughly the same time as a real verification.
///
/// Used when no user row matched, so "unknown user" and "wrong password"
/// cost the caller the same.
pub fn verify_against_dummy(password: &str) {
    // Valid cost-10 digest of a random string nobody knows.
    const DUMMY: &str = "$2b$10$Q0N7kYvV0c8xUQ0kS3Gx8eKj6m1z3zq0m3nS9bE7v0m2Yk3Xh8c1K";
    let _ = bcrypt::verify(password, DUMMY);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embeds_salt_and_cost() {
        let a = hash_password("s3cret!").unwrap();
        let b = hash_password("s3cret!").unwrap();
        assert!(a.starts_with("$2b$10$"));
        assert_ne!(a, b);
    }

    #[test]
    fn verify_accepts_right_and_rejects_wrong() {
        let digest = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &digest));
        assert!(!verify_password("battery staple", &digest));
    }

    #[test]
    fn malformed_digest_is_a_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-digest"));
    }
}
