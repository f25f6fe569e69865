/// Reasons a single report could not be turned into a location.
///
/// Every variant is local to one report: callers drop the report and carry on with the rest of
/// the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecryptError {
    /// The payload is too short (or too long) for the fields being read out of it.
    #[error("malformed payload: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        /// Length the layout requires.
        expected: usize,
        /// Length that was received.
        actual: usize,
    },
    /// The payload is not valid base64.
    #[error("payload is not valid base64")]
    InvalidEncoding,
    /// The finder's ephemeral key is not a valid P-224 point.
    #[error("ephemeral public key is not a valid P-224 point")]
    InvalidEphemeralKey,
    /// An advertisement key is not the x coordinate of any P-224 point.
    #[error("advertisement key is not a valid P-224 x coordinate")]
    InvalidAdvertisementKey,
    /// The private key bytes are not a valid P-224 scalar.
    #[error("private key is not a valid P-224 scalar")]
    InvalidPrivateKey,
    /// ANSI X9.63 KDF refused to produce the symmetric key.
    #[error("key derivation failed")]
    KeyDerivation,
    /// AES-GCM tag mismatch: tampered data or the wrong private key.
    #[error("authentication tag mismatch")]
    AuthenticationFailed,
}
