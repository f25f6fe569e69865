use core::fmt;

#[cfg(feature = "std")]
use base64::{engine::general_purpose::STANDARD as b64, Engine as _};
use p224::{
    elliptic_curve::{
        rand_core::CryptoRngCore,
        sec1::{Tag, ToEncodedPoint},
    },
    PublicKey, SecretKey,
};
use sha2_pre::{Digest, Sha256};

use super::DecryptError;

/// The 28-byte key an accessory advertises: the x coordinate of its P-224 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvertisementKey(pub [u8; 28]);

impl AdvertisementKey {
    /// The identifier finder devices file reports under.
    pub fn hash(&self) -> KeyIdentifier {
        KeyIdentifier::of(&self.0)
    }

    /// Base64 form, which is also how accessories are identified.
    #[cfg(feature = "std")]
    pub fn to_base64(&self) -> std::string::String {
        b64.encode(self.0)
    }

    /// Parse the base64 form of an advertisement key.
    #[cfg(feature = "std")]
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let decoded = b64.decode(encoded).ok()?;
        Self::try_from(decoded.as_slice()).ok()
    }
}

impl From<&PublicKey> for AdvertisementKey {
    fn from(value: &PublicKey) -> Self {
        let point = value.to_encoded_point(true);
        // drop the SEC1 tag byte, keeping only the x coordinate
        let mut key = [0u8; 28];
        key.copy_from_slice(&point.as_bytes()[1..29]);

        Self(key)
    }
}

impl From<&SecretKey> for AdvertisementKey {
    fn from(value: &SecretKey) -> Self {
        Self::from(&value.public_key())
    }
}

impl TryFrom<&[u8]> for AdvertisementKey {
    type Error = DecryptError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let key: [u8; 28] = value.try_into().map_err(|_| DecryptError::MalformedPayload {
            expected: 28,
            actual: value.len(),
        })?;

        Ok(Self(key))
    }
}

impl TryFrom<&AdvertisementKey> for PublicKey {
    type Error = DecryptError;

    fn try_from(value: &AdvertisementKey) -> Result<Self, Self::Error> {
        let mut data = [0u8; 29];
        data[0] = Tag::CompressedEvenY.into(); // `Tag::CompressedOddY` would also work fine
        data[1..29].copy_from_slice(&value.0);

        PublicKey::from_sec1_bytes(&data).map_err(|_| DecryptError::InvalidAdvertisementKey)
    }
}

impl fmt::Debug for AdvertisementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdvertisementKey(")?;
        write_hex(f, &self.0)?;
        f.write_str(")")
    }
}

/// SHA-256 of an advertisement key. Reports are stored and queried under this value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyIdentifier(pub [u8; 32]);

impl KeyIdentifier {
    /// Hash raw advertisement key bytes into an identifier.
    pub fn of(advertisement_key: &[u8]) -> Self {
        Self(Sha256::digest(advertisement_key).0)
    }

    /// Base64 form used in fetch queries and in the `id` of returned reports.
    #[cfg(feature = "std")]
    pub fn to_base64(&self) -> std::string::String {
        b64.encode(self.0)
    }

    /// Parse a base64 identifier as returned by the server.
    #[cfg(feature = "std")]
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let decoded = b64.decode(encoded).ok()?;
        let digest: [u8; 32] = decoded.as_slice().try_into().ok()?;

        Some(Self(digest))
    }
}

impl fmt::Debug for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyIdentifier(")?;
        write_hex(f, &self.0)?;
        f.write_str(")")
    }
}

/// Size of a P-224 scalar.
const PRIVATE_KEY_LEN: usize = 28;

/// An accessory's P-224 private key. Only ever read; never leaves the owner's machine.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    /// Parse a big-endian scalar. 28 bytes is canonical; shorter inputs are left-padded and
    /// longer ones (e.g. 32-byte exports) may carry leading zero bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecryptError> {
        let bytes = match bytes.len().checked_sub(PRIVATE_KEY_LEN) {
            Some(extra) if extra > 0 => {
                let (padding, scalar) = bytes.split_at(extra);
                if padding.iter().any(|&byte| byte != 0) {
                    return Err(DecryptError::InvalidPrivateKey);
                }
                scalar
            }
            _ => bytes,
        };

        SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| DecryptError::InvalidPrivateKey)
    }

    /// Generate a fresh key.
    pub fn random(csprng: &mut impl CryptoRngCore) -> Self {
        Self(SecretKey::random(csprng))
    }

    /// The canonical 28-byte big-endian scalar.
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.0.to_bytes().into()
    }

    /// The key the matching accessory advertises.
    pub fn advertisement_key(&self) -> AdvertisementKey {
        AdvertisementKey::from(&self.0)
    }

    /// Shorthand for `self.advertisement_key().hash()`.
    pub fn key_identifier(&self) -> KeyIdentifier {
        self.advertisement_key().hash()
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.0
    }
}

impl From<SecretKey> for PrivateKey {
    fn from(value: SecretKey) -> Self {
        Self(value)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02X}", byte)?;
    }
    Ok(())
}
