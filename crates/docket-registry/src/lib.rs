//! Registry layer: where raw case records come from.

mod client;
mod fixture;

pub use client::{RegistryClient, RegistryError};
pub use docket_core::RawCaseRecord;
pub use fixture::FixtureRegistry;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpRegistryClient;
