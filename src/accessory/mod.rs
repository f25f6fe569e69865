use chrono::{DateTime, Utc};
use serde::Serialize;

/// Importing OpenHaystack accessory property lists.
mod import;
/// Where accessories' private keys live.
mod store;

pub use import::{import_accessories, import_accessories_file, ImportError};
pub use store::{KeyStore, MemoryKeyStore};

/// A tracked accessory as presented to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accessory {
    /// Base64 of the accessory's 28-byte advertisement key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Icon name, empty when none was set.
    pub icon: String,
    /// Newest first.
    pub locations: Vec<Location>,
    /// Reachability as of the last refresh.
    pub status: AccessoryStatus,
}

impl Accessory {
    /// An inactive accessory with no known locations.
    pub fn new(id: impl Into<String>, name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
            locations: Vec::new(),
            status: AccessoryStatus::Inactive,
        }
    }

    /// The newest known location, if any.
    pub fn latest_location(&self) -> Option<&Location> {
        self.locations.first()
    }
}

/// Whether an accessory has been heard from recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessoryStatus {
    /// Nearby over Bluetooth. Never produced by a report refresh.
    Connected,
    /// Has at least one location inside the reporting window.
    Active,
    /// No location inside the reporting window.
    Inactive,
}

/// A decrypted location attached to an accessory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
    /// Filled in by reverse geocoding, which this crate doesn't do.
    pub address: Option<String>,
    /// When the location was observed.
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy in meters.
    pub accuracy: u8,
    /// Finder's confidence byte, when the report carried one.
    pub confidence: Option<u8>,
}

impl From<&crate::protocol::DecryptedLocationReport> for Location {
    fn from(report: &crate::protocol::DecryptedLocationReport) -> Self {
        Self {
            latitude: report.location.latitude.0,
            longitude: report.location.longitude.0,
            address: None,
            timestamp: report.observed_at(),
            accuracy: report.location.horizontal_accuracy,
            confidence: report.confidence,
        }
    }
}
