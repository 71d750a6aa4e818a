use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha512;
use subtle::ConstantTimeEq;

use kindred_shared::errors::{AppError, AppResult};

const ITERATIONS: u32 = 10_000;
const KEY_LEN: usize = 64;
const SALT_LEN: usize = 16;

/// PBKDF2-HMAC-SHA512, stored as `"<salt-hex>:<hash-hex>"`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);

    let derived = derive(password, salt_hex.as_bytes());
    format!("{salt_hex}:{}", hex::encode(derived))
}

pub fn verify_password(password: &str, stored: &str) -> AppResult<bool> {
    let (salt_hex, hash_hex) = stored
        .split_once(':')
        .ok_or_else(|| AppError::internal("malformed password hash"))?;
    let expected = hex::decode(hash_hex)
        .map_err(|e| AppError::internal(format!("malformed password hash: {e}")))?;

    // The salt is used in its hex form, matching credentials already on disk.
    let derived = derive(password, salt_hex.as_bytes());
    Ok(derived.as_slice().ct_eq(expected.as_slice()).into())
}

fn derive(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, ITERATIONS, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_has_salt_and_digest() {
        let stored = hash_password("secret1");
        let (salt, hash) = stored.split_once(':').unwrap();
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert_eq!(hash.len(), KEY_LEN * 2);
    }

    #[test]
    fn correct_password_verifies() {
        let stored = hash_password("secret1");
        assert!(verify_password("secret1", &stored).unwrap());
        assert!(!verify_password("secret2", &stored).unwrap());
        assert!(!verify_password("", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash_password("secret1"), hash_password("secret1"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("x", "no-separator").is_err());
        assert!(verify_password("x", "abcd:zz").is_err());
    }
}
