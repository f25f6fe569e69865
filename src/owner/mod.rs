/// Decrypting a single report.
mod device;

/// Concurrent decryption of a fetched batch of reports.
#[cfg(feature = "std")]
pub mod batch;
/// Sharing one in-flight refresh between callers.
#[cfg(feature = "std")]
mod manager;
/// Fetch, decrypt and attach locations to accessories.
#[cfg(feature = "std")]
mod retrieval;

pub use device::OwnerDevice;
#[cfg(feature = "std")]
pub use manager::AccessoriesManager;
#[cfg(feature = "std")]
pub use retrieval::{RefreshError, RetrievalPipeline};
