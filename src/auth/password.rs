use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

lazy_static! {
    /// Hash checked when the account does not exist, so an unknown email
    /// costs the same Argon2 work as a wrong password.
    static ref DECOY_HASH: String =
        hash_password("decoy-password-never-matches").unwrap_or_default();
}

#[cfg(test)]
thread_local! {
    static VERIFY_CALLS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Argon2 verifications run on this thread so far.
#[cfg(test)]
pub(crate) fn verify_calls() -> usize {
    VERIFY_CALLS.with(|c| c.get())
}

/// Salted Argon2id hash in PHC string format.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "failed to hash password");
            anyhow::anyhow!("password hashing failed: {e}")
        })
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash cannot be parsed.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    #[cfg(test)]
    VERIFY_CALLS.with(|c| c.set(c.get() + 1));

    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("stored password hash is not a PHC string: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Run a full verification against the decoy hash and discard the result.
pub fn verify_decoy(plain: &str) {
    let _ = verify_password(plain, &DECOY_HASH);
}
