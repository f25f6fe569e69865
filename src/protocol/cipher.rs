//! Sealing and opening report locations.

use aes_gcm::{
    aead::{consts::U16, AeadMutInPlace, KeyInit},
    aes::Aes128,
    AesGcm, Key,
};

use super::{kdf::DerivedKey, DecryptError, PLAINTEXT_LEN};

/// AES-128-GCM with the 16-byte nonce FindMy takes from the second half of the derived key.
pub type Aes = AesGcm<Aes128, U16>;

fn cipher(key: &DerivedKey) -> (Aes, &[u8]) {
    let (encryption_key, iv) = key.split();
    (Aes::new(Key::<Aes>::from_slice(encryption_key)), iv)
}

/// Encrypt a location, returning the ciphertext and its tag.
pub fn seal(
    key: &DerivedKey,
    mut plaintext: [u8; PLAINTEXT_LEN],
) -> Result<([u8; PLAINTEXT_LEN], [u8; 16]), aes_gcm::Error> {
    let (mut cipher, iv) = cipher(key);
    let tag = cipher.encrypt_in_place_detached(iv.into(), &[], &mut plaintext)?;

    Ok((plaintext, tag.into()))
}

/// Decrypt and authenticate a location.
pub fn open(
    key: &DerivedKey,
    mut ciphertext: [u8; PLAINTEXT_LEN],
    tag: &[u8; 16],
) -> Result<[u8; PLAINTEXT_LEN], DecryptError> {
    let (mut cipher, iv) = cipher(key);
    cipher
        .decrypt_in_place_detached(iv.into(), &[], &mut ciphertext, tag.into())
        .map_err(|_| DecryptError::AuthenticationFailed)?;

    Ok(ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_sealed() {
        let key = DerivedKey([0x5a; 32]);
        let (ciphertext, tag) = seal(&key, *b"0123456789").unwrap();

        assert_ne!(&ciphertext, b"0123456789");
        assert_eq!(&open(&key, ciphertext, &tag).unwrap(), b"0123456789");
    }

    #[test]
    fn test_open_with_other_key_fails() {
        let (ciphertext, tag) = seal(&DerivedKey([0x5a; 32]), [0; PLAINTEXT_LEN]).unwrap();

        assert_eq!(
            open(&DerivedKey([0xa5; 32]), ciphertext, &tag),
            Err(DecryptError::AuthenticationFailed)
        );
    }
}
