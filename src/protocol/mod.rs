pub mod cipher;
mod error;
mod keys;
pub mod kdf;
mod report;

pub use error::DecryptError;
pub use keys::{AdvertisementKey, KeyIdentifier, PrivateKey};
pub use report::{
    apple_epoch, Coordinate, DecryptedLocationReport, EncryptedReportPayload, Location,
    ReportContext, ReportData, ENCRYPTED_PAYLOAD_LEN, PLAINTEXT_LEN,
};
