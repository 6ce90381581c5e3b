use rand::{distr::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// Length of passwords handed out by the reset flow
pub const GENERATED_PASSWORD_LEN: usize = 20;

/// Hashes a secret with a fresh random salt: `sha256$<salt>$<digest>`
pub fn hash_secret(secret: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    let salt_hex = hex::encode(salt);
    format!("{}${}${}", SCHEME, salt_hex, digest(&salt_hex, secret))
}

/// Checks a secret against a stored hash; malformed hashes never verify
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SCHEME), Some(salt_hex), Some(expected)) => {
            constant_time_eq(digest(salt_hex, secret).as_bytes(), expected.as_bytes())
        }
        _ => false,
    }
}

/// Random alphanumeric password
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn digest(salt_hex: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Visits every byte before answering, so timing does not reveal the first mismatch.
/// Lengths may leak; both sides are fixed-length hex digests.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
