use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512_256};
use thiserror::Error;

/// Token keys must carry at least 256 bits of entropy (RFC 6819 §5.1.4.2.2).
const MINIMUM_ENTROPY: usize = 32;

/// The operator secret must be at least 32 bytes to be worth signing with.
const MINIMUM_SECRET_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("secret for signing HMAC-SHA512/256 is expected to be at least 32 bytes, got {0}")]
    SecretTooShort(usize),
    #[error("invalid token format")]
    InvalidFormat,
    #[error("token signature mismatch")]
    SignatureMismatch,
}

/// Derive the fixed-length signing key from an operator secret.
///
/// The secret is hashed so the signing key is always exactly 32 bytes,
/// whatever length the operator supplied.
pub fn hash_secret(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

/// HMAC-based opaque token codec.
///
/// A token is `base64url(key) "." base64url(signature)` without padding,
/// where `key` is freshly drawn entropy and `signature` is
/// HMAC-SHA512/256(key, signing_key). The signature doubles as the storage
/// lookup key, so validation and lookup share one datum.
pub struct HmacCodec {
    /// Token entropy in bytes. Mutated by [`generate`](Self::generate) when
    /// configured below the floor, hence the mutex.
    entropy: Mutex<usize>,
    secret_len: usize,
    signing_key: [u8; 32],
}

impl HmacCodec {
    pub fn new(secret: &str, entropy_bytes: usize) -> Self {
        Self {
            entropy: Mutex::new(entropy_bytes),
            secret_len: secret.len(),
            signing_key: hash_secret(secret),
        }
    }

    /// Generate a token and its matching signature.
    ///
    /// The whole sequence runs under the local mutex: the entropy floor is
    /// enforced by writing back to the shared config value, and concurrent
    /// callers must not observe a torn update.
    pub fn generate(&self) -> Result<(String, String), CodecError> {
        let mut entropy = self.entropy.lock().expect("entropy mutex poisoned");

        if self.secret_len < MINIMUM_SECRET_LENGTH {
            return Err(CodecError::SecretTooShort(self.secret_len));
        }

        if *entropy < MINIMUM_ENTROPY {
            *entropy = MINIMUM_ENTROPY;
        }

        let mut token_key = vec![0u8; *entropy];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut token_key);

        let signature = self.hmac(&token_key);

        let encoded_signature = URL_SAFE_NO_PAD.encode(signature);
        let token = format!("{}.{}", URL_SAFE_NO_PAD.encode(&token_key), encoded_signature);
        Ok((token, encoded_signature))
    }

    /// Validate a token against the signing key.
    ///
    /// Callers must translate any error into a uniform "inactive" outward
    /// signal; the variants exist for logs and tests, not for responses.
    pub fn validate(&self, token: &str) -> Result<(), CodecError> {
        if self.secret_len < MINIMUM_SECRET_LENGTH {
            return Err(CodecError::SecretTooShort(self.secret_len));
        }

        let (token_key, token_signature) = match token.split_once('.') {
            Some((key, sig)) if !key.is_empty() && !sig.is_empty() && !sig.contains('.') => {
                (key, sig)
            }
            _ => return Err(CodecError::InvalidFormat),
        };

        let decoded_signature = URL_SAFE_NO_PAD
            .decode(token_signature)
            .map_err(|_| CodecError::InvalidFormat)?;
        let decoded_key = URL_SAFE_NO_PAD
            .decode(token_key)
            .map_err(|_| CodecError::InvalidFormat)?;

        let mut mac = self.mac();
        mac.update(&decoded_key);
        // verify_slice compares in constant time
        mac.verify_slice(&decoded_signature)
            .map_err(|_| CodecError::SignatureMismatch)
    }

    /// Extract the encoded signature segment without any cryptographic check.
    ///
    /// Only usable as a lookup key; never an authenticity assertion.
    pub fn signature(&self, token: &str) -> String {
        match token.split_once('.') {
            Some((_, sig)) if !sig.contains('.') => sig.to_string(),
            _ => String::new(),
        }
    }

    fn mac(&self) -> Hmac<Sha512_256> {
        // HMAC accepts keys of any length; failure here is a broken
        // precondition, not an operational error.
        Hmac::<Sha512_256>::new_from_slice(&self.signing_key)
            .expect("HMAC accepts keys of any length")
    }

    fn hmac(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}
