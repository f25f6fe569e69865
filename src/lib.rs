//! Fetching and decrypting offline-finding location reports for OpenHaystack accessories.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

/// Tracked accessories, their keys, and importing them.
#[cfg(feature = "std")]
pub mod accessory;
/// Configuration file and overrides.
#[cfg(feature = "std")]
pub mod config;
/// An offline finding finder device.
pub mod finder;
/// An offline finding owner device.
pub mod owner;
/// Structs that capture aspects of Apple's FindMy protocol.
pub mod protocol;
/// Talking to a report aggregation server.
#[cfg(feature = "std")]
pub mod server;

pub use p224;
