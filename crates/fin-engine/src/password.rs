//! Salted, iterated SHA-256 password digests.
//!
//! Stored form: `sha256$<iterations>$<salt_hex>$<digest_hex>`.
//! d₀ = H(salt ‖ password), dᵢ = H(dᵢ₋₁ ‖ salt ‖ password).

use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";

/// Hash with a fresh random 16-byte salt.
pub fn hash_password(password: &str, iterations: u32) -> String {
    let salt = uuid::Uuid::new_v4();
    hash_password_with_salt(password, salt.as_bytes(), iterations)
}

pub fn hash_password_with_salt(password: &str, salt: &[u8], iterations: u32) -> String {
    let iterations = iterations.max(1);
    let digest = stretch(password.as_bytes(), salt, iterations);
    format!(
        "{SCHEME}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(digest)
    )
}

/// `false` for a wrong password and for any malformed stored string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iters), Some(salt_hex), Some(digest_hex), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iters.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };
    if iterations == 0 {
        return false;
    }

    let actual = stretch(password.as_bytes(), &salt, iterations);
    constant_time_eq(&actual, &expected)
}

fn stretch(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password)
        .finalize()
        .into();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt)
            .chain_update(password)
            .finalize()
            .into();
    }
    digest
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
