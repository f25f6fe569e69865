use std::{fs, path::Path};

use serde::Deserialize;
use tracing::{info, warn};

use crate::protocol::{DecryptError, PrivateKey};

use super::{Accessory, AccessoryStatus, MemoryKeyStore};

/// Why an accessories export couldn't be imported.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The file couldn't be read.
    #[error("failed to read accessories: {0}")]
    Io(#[from] std::io::Error),
    /// Not a plist, or not a list of accessories.
    #[error("failed to parse accessories plist: {0}")]
    Parse(#[from] plist::Error),
    /// An entry's private key isn't a P-224 scalar.
    #[error("accessory {name:?} has an invalid private key: {source}")]
    InvalidPrivateKey {
        /// Name of the offending entry.
        name: String,
        /// What was wrong with the key.
        #[source]
        source: DecryptError,
    },
}

/// One entry of an OpenHaystack accessories export. Fields we don't use are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessoryPlistEntry {
    name: String,
    private_key: plist::Data,
    #[serde(default)]
    uses_derivation: bool,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    is_active: bool,
}

/// Parse an accessories plist (XML or binary), registering each private key with `store`.
///
/// Accessories that rotate keys via derivation aren't supported and are skipped.
pub fn import_accessories(
    data: &[u8],
    store: &mut MemoryKeyStore,
) -> Result<Vec<Accessory>, ImportError> {
    let entries: Vec<AccessoryPlistEntry> = plist::from_bytes(data)?;

    let mut accessories = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.uses_derivation {
            warn!(name = %entry.name, "skipping accessory that uses key derivation");
            continue;
        }

        let private_key = PrivateKey::from_bytes(entry.private_key.as_ref()).map_err(|source| {
            ImportError::InvalidPrivateKey {
                name: entry.name.clone(),
                source,
            }
        })?;
        let id = private_key.advertisement_key().to_base64();

        store.insert(id.clone(), private_key);

        let mut accessory = Accessory::new(id, entry.name, entry.icon);
        if entry.is_active {
            accessory.status = AccessoryStatus::Active;
        }
        accessories.push(accessory);
    }

    info!(count = accessories.len(), "imported accessories");
    Ok(accessories)
}

/// Read and import an accessories plist from `path`. See [`import_accessories`].
pub fn import_accessories_file(
    path: impl AsRef<Path>,
    store: &mut MemoryKeyStore,
) -> Result<Vec<Accessory>, ImportError> {
    import_accessories(&fs::read(path)?, store)
}
