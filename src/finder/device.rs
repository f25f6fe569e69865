use anyhow::{anyhow, Result};
use p224::{
    elliptic_curve::{ecdh, sec1::ToEncodedPoint},
    PublicKey,
};
use rand_core::CryptoRngCore;

use crate::protocol::{cipher, kdf, AdvertisementKey, EncryptedReportPayload, ReportData};

/// Plays the part of a passer-by's phone that overhears an accessory and uploads its location.
pub struct FinderDevice();

impl FinderDevice {
    /// Encrypt `report` to `accessory_public_key` under a fresh ephemeral key.
    pub fn encrypt_report(
        &self,
        csprng: &mut impl CryptoRngCore,
        accessory_public_key: &AdvertisementKey,
        report: &ReportData,
    ) -> Result<EncryptedReportPayload> {
        // (1) Generate a new ephemeral key
        let finder_secret = ecdh::EphemeralSecret::random(csprng);
        let finder_public_key = finder_secret.public_key();

        // (2) Perform ECDH using the ephemeral private key and the advertised public key
        let advertised_public_key = PublicKey::try_from(accessory_public_key)?;
        let shared_secret = finder_secret.diffie_hellman(&advertised_public_key);

        // (3) Derive a symmetric key with ANSI X.963 KDF on the shared secret
        let finder_public_key_point = finder_public_key.to_encoded_point(false);
        let symmetric_key = kdf::derive(
            shared_secret.raw_secret_bytes().as_slice(),
            finder_public_key_point.as_bytes(),
        )?;

        // (4) Encrypt the location with AES-GCM under the first half of the key, using the
        // second half as the IV
        let (encrypted_location, tag) =
            cipher::seal(&symmetric_key, report.location.to_bytes()).map_err(|e| anyhow!(e))?;

        Ok(EncryptedReportPayload {
            timestamp: report.timestamp,
            confidence: report.confidence,
            finder_public_key,
            encrypted_location,
            tag,
        })
    }
}
