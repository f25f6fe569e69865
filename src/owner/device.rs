use chrono::{DateTime, Utc};
use p224::elliptic_curve::{ecdh, sec1::ToEncodedPoint};

use crate::protocol::{
    cipher, kdf, DecryptError, DecryptedLocationReport, EncryptedReportPayload, PrivateKey,
};

/// Plays the part of the accessory owner, who holds the private keys.
pub struct OwnerDevice();

impl OwnerDevice {
    /// Decrypt a raw 88-byte payload as returned by the reports server.
    pub fn decrypt_payload(
        &self,
        accessory_private_key: &PrivateKey,
        payload: &[u8],
        date_published: DateTime<Utc>,
    ) -> Result<DecryptedLocationReport, DecryptError> {
        let encrypted_report = EncryptedReportPayload::deserialize(payload)?;
        self.decrypt_report(accessory_private_key, &encrypted_report, date_published)
    }

    /// Decrypt a report addressed to `accessory_private_key`.
    pub fn decrypt_report(
        &self,
        accessory_private_key: &PrivateKey,
        encrypted_report: &EncryptedReportPayload,
        date_published: DateTime<Utc>,
    ) -> Result<DecryptedLocationReport, DecryptError> {
        let finder_public_key = encrypted_report.finder_public_key;

        let shared_secret = ecdh::diffie_hellman(
            accessory_private_key.secret_key().to_nonzero_scalar(),
            finder_public_key.as_affine(),
        );

        let finder_public_key_point = finder_public_key.to_encoded_point(false);
        let symmetric_key = kdf::derive(
            shared_secret.raw_secret_bytes(),
            finder_public_key_point.as_bytes(),
        )?;

        let decrypted_location = cipher::open(
            &symmetric_key,
            encrypted_report.encrypted_location,
            &encrypted_report.tag,
        )?;

        DecryptedLocationReport::decode(
            &decrypted_location,
            &encrypted_report.context(date_published),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::{
        finder::FinderDevice,
        protocol::{Coordinate, Location, ReportData, ENCRYPTED_PAYLOAD_LEN},
    };

    use super::*;

    fn published() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T17:00:00Z")
            .expect("it's a valid date")
            .into()
    }

    fn encrypt(private_key: &PrivateKey, location: &Location) -> EncryptedReportPayload {
        FinderDevice()
            .encrypt_report(
                &mut rand::rngs::OsRng,
                &private_key.advertisement_key(),
                &ReportData {
                    timestamp: published() - Duration::minutes(20),
                    confidence: 1,
                    location: location.clone(),
                },
            )
            .unwrap()
    }

    fn sample_location() -> Location {
        Location {
            latitude: Coordinate::from_raw(525_200_066),
            longitude: Coordinate::from_raw(-134_049_540),
            horizontal_accuracy: 5,
        }
    }

    #[test]
    fn test_decrypt_encrypted_report() {
        let location = sample_location();
        let accessory_private_key = PrivateKey::random(&mut rand::rngs::OsRng);
        let encrypted_report = encrypt(&accessory_private_key, &location);

        let owner_device = OwnerDevice();
        let decrypted_report = owner_device
            .decrypt_report(&accessory_private_key, &encrypted_report, published())
            .unwrap();

        assert_eq!(decrypted_report.timestamp, Some(encrypted_report.timestamp));
        assert_eq!(decrypted_report.confidence, Some(encrypted_report.confidence));
        assert_eq!(decrypted_report.date_published, published());
        assert_eq!(decrypted_report.location, location);
    }

    #[test]
    fn test_decrypt_serialized_payload() {
        let location = sample_location();
        let accessory_private_key = PrivateKey::random(&mut rand::rngs::OsRng);
        let payload = encrypt(&accessory_private_key, &location).serialize();

        let decrypted_report = OwnerDevice()
            .decrypt_payload(&accessory_private_key, &payload, published())
            .unwrap();

        assert_eq!(decrypted_report.location.latitude.to_raw(), 525_200_066);
        assert_eq!(decrypted_report.location.longitude.to_raw(), -134_049_540);
        assert_eq!(decrypted_report.location.horizontal_accuracy, 5);
        assert_eq!(
            decrypted_report.timestamp,
            Some(published() - Duration::minutes(20))
        );
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let location = sample_location();
        let accessory_private_key = PrivateKey::random(&mut rand::rngs::OsRng);
        let other_private_key = PrivateKey::random(&mut rand::rngs::OsRng);
        let encrypted_report = encrypt(&accessory_private_key, &location);

        let result =
            OwnerDevice().decrypt_report(&other_private_key, &encrypted_report, published());

        assert_eq!(result, Err(DecryptError::AuthenticationFailed));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let accessory_private_key = PrivateKey::random(&mut rand::rngs::OsRng);
        let mut payload = encrypt(&accessory_private_key, &sample_location()).serialize();
        payload[65] ^= 0x01;

        let result = OwnerDevice().decrypt_payload(&accessory_private_key, &payload, published());

        assert_eq!(result, Err(DecryptError::AuthenticationFailed));
    }

    #[test]
    fn test_short_payload_is_malformed() {
        let accessory_private_key = PrivateKey::random(&mut rand::rngs::OsRng);
        let payload = encrypt(&accessory_private_key, &sample_location()).serialize();

        let result =
            OwnerDevice().decrypt_payload(&accessory_private_key, &payload[..50], published());

        assert_eq!(
            result,
            Err(DecryptError::MalformedPayload {
                expected: ENCRYPTED_PAYLOAD_LEN,
                actual: 50
            })
        );
    }
}
