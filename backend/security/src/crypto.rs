//! Salt/key generation and the salted token derivation.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use wor_core::TokenCrypto;

type HmacSha256 = Hmac<Sha256>;

const SALT_BYTES: usize = 32;
const API_KEY_BYTES: usize = 32;

/// Generate `len` random bytes from the thread-local CSPRNG, hex encoded.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time, case-insensitive comparison of two hex tokens.
pub fn tokens_match(a: &str, b: &str) -> bool {
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// HMAC-SHA256 keyed by the salt.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacTokenCrypto;

impl HmacTokenCrypto {
    pub fn new() -> Self {
        Self
    }

    fn mac(salt: &str) -> HmacSha256 {
        HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC accepts any key length")
    }
}

impl TokenCrypto for HmacTokenCrypto {
    fn generate_salt(&self) -> String {
        random_hex(SALT_BYTES)
    }

    fn generate_api_key(&self) -> String {
        random_hex(API_KEY_BYTES)
    }

    fn hash(&self, secret: &str, salt: &str) -> String {
        let mut mac = Self::mac(salt);
        mac.update(secret.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, secret: &str, salt: &str, expected: &str) -> bool {
        let Ok(expected) = hex::decode(expected) else {
            return false;
        };
        let mut mac = Self::mac(salt);
        mac.update(secret.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}
