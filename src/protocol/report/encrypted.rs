#[cfg(feature = "std")]
use base64::{engine::general_purpose::STANDARD as b64, Engine as _};
use chrono::{DateTime, Utc};
use p224::{elliptic_curve::sec1::ToEncodedPoint, PublicKey};

use crate::protocol::{AdvertisementKey, DecryptError};

use super::{apple_epoch, ReportContext};

/// Size of a serialized encrypted report.
pub const ENCRYPTED_PAYLOAD_LEN: usize = 88;

/// An encrypted report as uploaded by a finder device.
///
/// Layout: `[0,4)` on-device timestamp (big-endian, seconds since 2001-01-01), `[4]`
/// confidence, `[5,62)` uncompressed ephemeral public key, `[62,72)` ciphertext, `[72,88)`
/// AES-GCM tag.
#[derive(Clone, PartialEq)]
pub struct EncryptedReportPayload {
    /// When the finder saw the accessory, to the second.
    pub timestamp: DateTime<Utc>,
    /// Finder's confidence in the location.
    pub confidence: u8,
    /// Finder device's ephemeral public key from the keypair that was used during the location encryption process.
    pub finder_public_key: PublicKey,
    /// Ciphertext of the 10-byte location.
    pub encrypted_location: [u8; 10],
    /// AES-GCM authentication tag.
    pub tag: [u8; 16],
}

impl EncryptedReportPayload {
    /// Lay the fields out in the 88-byte wire format.
    pub fn serialize(&self) -> [u8; ENCRYPTED_PAYLOAD_LEN] {
        let seconds = apple_epoch::from_datetime(&self.timestamp);
        let point = self.finder_public_key.to_encoded_point(false);

        let mut output = [0; ENCRYPTED_PAYLOAD_LEN];
        output[0..4].copy_from_slice(&seconds.to_be_bytes());
        output[4] = self.confidence;
        output[5..62].copy_from_slice(point.as_bytes());
        output[62..72].copy_from_slice(&self.encrypted_location);
        output[72..88].copy_from_slice(&self.tag);

        output
    }

    /// Read a payload of exactly [`ENCRYPTED_PAYLOAD_LEN`] bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self, DecryptError> {
        let bytes: &[u8; ENCRYPTED_PAYLOAD_LEN] =
            data.try_into()
                .map_err(|_| DecryptError::MalformedPayload {
                    expected: ENCRYPTED_PAYLOAD_LEN,
                    actual: data.len(),
                })?;

        let seconds = i32::from_be_bytes(bytes[0..4].try_into().expect("correctly-sized slice"));
        let timestamp = apple_epoch::to_datetime(seconds);

        let confidence = bytes[4];
        let finder_public_key = PublicKey::from_sec1_bytes(&bytes[5..62])
            .map_err(|_| DecryptError::InvalidEphemeralKey)?;
        let encrypted_location = &bytes[62..72];
        let tag = &bytes[72..88];

        Ok(Self {
            timestamp,
            confidence,
            finder_public_key,
            encrypted_location: encrypted_location
                .try_into()
                .expect("correctly-sized slice"),
            tag: tag.try_into().expect("correctly-sized slice"),
        })
    }

    /// The outer fields a decrypted location is combined with.
    pub fn context(&self, date_published: DateTime<Utc>) -> ReportContext {
        ReportContext {
            date_published,
            timestamp: Some(self.timestamp),
            confidence: Some(self.confidence),
        }
    }
}

impl core::fmt::Debug for EncryptedReportPayload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let finder_public_key = AdvertisementKey::from(&self.finder_public_key);

        let mut debug = f.debug_struct("EncryptedReportPayload");
        debug
            .field("timestamp", &self.timestamp)
            .field("confidence", &self.confidence);

        #[cfg(feature = "std")]
        debug
            .field("finder_public_key", &b64.encode(finder_public_key.0))
            .field("encrypted_location", &hex::encode_upper(self.encrypted_location))
            .field("tag", &hex::encode_upper(self.tag));
        #[cfg(not(feature = "std"))]
        debug
            .field("finder_public_key", &finder_public_key)
            .field("encrypted_location", &self.encrypted_location)
            .field("tag", &self.tag);

        debug.finish()
    }
}
