//! Ed25519 key material for sqld JWT authentication.
//!
//! sqld verifies tokens against `SQLD_AUTH_JWT_KEY`, the url-safe base64
//! encoding of a 32-byte Ed25519 public key. The private half is stored next
//! to it so tokens can be minted outside the controller.

use crate::error::ControllerError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use rand::RngCore;

/// An encoded keypair ready to be written into a Secret.
#[derive(Clone)]
pub struct AuthKeyPair {
    /// 32-byte verifying key, url-safe base64 without padding
    pub public_key: String,
    /// 64-byte keypair (seed followed by public key), url-safe base64 without padding
    pub private_key: String,
}

impl std::fmt::Debug for AuthKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh keypair from the OS random number generator.
pub fn generate_auth_keypair() -> Result<AuthKeyPair, ControllerError> {
    let mut seed = [0u8; SECRET_KEY_LENGTH];
    OsRng
        .try_fill_bytes(&mut seed)
        .map_err(|e| ControllerError::KeyGeneration(e.to_string()))?;
    let signing_key = SigningKey::from_bytes(&seed);

    Ok(AuthKeyPair {
        public_key: URL_SAFE_NO_PAD.encode(signing_key.verifying_key().as_bytes()),
        private_key: URL_SAFE_NO_PAD.encode(signing_key.to_keypair_bytes()),
    })
}
