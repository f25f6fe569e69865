use chrono::{DateTime, Utc};

use crate::protocol::DecryptError;

use super::Location;

/// What a finder device knows before encrypting a report.
#[derive(Debug, Clone)]
pub struct ReportData {
    /// When the finder saw the accessory.
    pub timestamp: DateTime<Utc>,
    /// Finder's confidence in the location.
    pub confidence: u8,
    /// Where the finder was.
    pub location: Location,
}

/// Fields that accompany a decrypted location but live outside the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportContext {
    /// When the server received the report.
    pub date_published: DateTime<Utc>,
    /// On-device observation time, when known.
    pub timestamp: Option<DateTime<Utc>>,
    /// Finder's confidence byte, when known.
    pub confidence: Option<u8>,
}

/// A decrypted report.
#[cfg_attr(feature = "std", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedLocationReport {
    /// Decoded plaintext.
    pub location: Location,
    /// When the server received the report.
    pub date_published: DateTime<Utc>,
    /// On-device observation time, when known.
    pub timestamp: Option<DateTime<Utc>>,
    /// Finder's confidence byte, when known.
    pub confidence: Option<u8>,
}

impl DecryptedLocationReport {
    /// Decode a decrypted plaintext and attach the outer fields.
    pub fn decode(plaintext: &[u8], context: &ReportContext) -> Result<Self, DecryptError> {
        Ok(Self {
            location: Location::from_bytes(plaintext)?,
            date_published: context.date_published,
            timestamp: context.timestamp,
            confidence: context.confidence,
        })
    }

    /// When the location was observed, falling back to when it was published.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or(self.date_published)
    }
}

#[cfg(feature = "std")]
impl From<&DecryptedLocationReport> for geojson::Feature {
    fn from(report: &DecryptedLocationReport) -> Self {
        let geometry = geojson::Geometry::new(geojson::Value::Point(vec![
            report.location.longitude.0,
            report.location.latitude.0,
        ]));

        let mut properties = geojson::JsonObject::new();
        properties.insert(
            "timestamp".to_string(),
            report.observed_at().to_rfc3339().into(),
        );
        properties.insert(
            "datePublished".to_string(),
            report.date_published.to_rfc3339().into(),
        );
        properties.insert(
            "accuracy".to_string(),
            report.location.horizontal_accuracy.into(),
        );
        if let Some(confidence) = report.confidence {
            properties.insert("confidence".to_string(), confidence.into());
        }

        geojson::Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}
