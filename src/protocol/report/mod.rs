pub mod apple_epoch;
mod data;
mod encrypted;
mod location;

pub use data::{DecryptedLocationReport, ReportContext, ReportData};
pub use encrypted::{EncryptedReportPayload, ENCRYPTED_PAYLOAD_LEN};
pub use location::{Coordinate, Location, PLAINTEXT_LEN};
