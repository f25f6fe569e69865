use crate::protocol::DecryptError;

/// Size of a decrypted location.
pub const PLAINTEXT_LEN: usize = 10;

/// Bytes actually read out of a decrypted location; the last byte is reserved.
const PLAINTEXT_USED_LEN: usize = 9;

/// The location information included in offline finding reports.
#[cfg_attr(feature = "std", derive(serde::Serialize))]
#[derive(PartialEq, Debug, Clone)]
pub struct Location {
    /// Latitude geographical coordinate.
    pub latitude: Coordinate,
    /// Longitude geographical coordinate.
    pub longitude: Coordinate,
    /// Radius of the horizontal accuracy, in meters.
    pub horizontal_accuracy: u8,
}

/// A geographical coordinate.
#[cfg_attr(feature = "std", derive(serde::Serialize))]
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Coordinate(pub f64);

impl Coordinate {
    const SCALE: f64 = 10_000_000.0;

    /// Build a coordinate from FindMy's fixed-point integer form.
    pub fn from_raw(raw: i32) -> Self {
        Self(f64::from(raw) / Self::SCALE)
    }

    /// FindMy's fixed-point integer form, rounded to the nearest unit.
    pub fn to_raw(self) -> i32 {
        let scaled = self.0 * Self::SCALE;
        // no `f64::round` without std
        let rounded = if scaled >= 0.0 {
            scaled + 0.5
        } else {
            scaled - 0.5
        };

        rounded as i32
    }

    /// Serialize the coordinate into FindMy's canonical 4-byte representation.
    fn to_bytes(self) -> [u8; 4] {
        self.to_raw().to_be_bytes()
    }

    /// Deserialize a coordinate from FindMy's canonical 4-byte representation.
    fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::from_raw(i32::from_be_bytes(bytes))
    }
}

impl Location {
    /// Serialize the location into FindMy's canonical 10-byte representation.
    pub fn to_bytes(&self) -> [u8; PLAINTEXT_LEN] {
        let mut output = [0; PLAINTEXT_LEN];

        output[0..4].copy_from_slice(&self.latitude.to_bytes());
        output[4..8].copy_from_slice(&self.longitude.to_bytes());
        output[8] = self.horizontal_accuracy;

        output
    }

    /// Attempt to deserialize the location from FindMy's canonical 10-byte representation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecryptError> {
        if bytes.len() < PLAINTEXT_USED_LEN {
            return Err(DecryptError::MalformedPayload {
                expected: PLAINTEXT_LEN,
                actual: bytes.len(),
            });
        }

        let latitude =
            Coordinate::from_bytes(bytes[0..4].try_into().expect("correctly-sized slice"));
        let longitude =
            Coordinate::from_bytes(bytes[4..8].try_into().expect("correctly-sized slice"));
        let horizontal_accuracy = bytes[8];

        Ok(Self {
            latitude,
            longitude,
            horizontal_accuracy,
        })
    }
}
