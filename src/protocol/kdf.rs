//! Symmetric key derivation for report encryption.
//!
//! FindMy uses a single block of the ANSI X9.63 KDF with SHA-256:
//! `SHA-256(shared_secret || 0x00000001 || ephemeral_public_key)`. The 32-byte output is split
//! into an AES-128 key and a 16-byte GCM nonce.

use sha2_pre::Sha256;

use super::DecryptError;

/// Output of [`derive`]: AES key followed by the IV.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DerivedKey(pub [u8; 32]);

impl DerivedKey {
    /// Split into `(aes_key, iv)`.
    pub fn split(&self) -> (&[u8], &[u8]) {
        self.0.split_at(16)
    }
}

/// Derive the symmetric key from an ECDH shared secret and the finder's uncompressed
/// ephemeral public key (57 bytes).
pub fn derive(shared_secret: &[u8], ephemeral_public_key: &[u8]) -> Result<DerivedKey, DecryptError> {
    let mut symmetric_key = [0u8; 32];

    ansi_x963_kdf::derive_key_into::<Sha256>(shared_secret, ephemeral_public_key, &mut symmetric_key)
        .map_err(|_| DecryptError::KeyDerivation)?;

    Ok(DerivedKey(symmetric_key))
}
