//! Node access for the dashboard.
//!
//! - [`AlgodClient`]: REST client implementing [`TelemetrySource`]
//! - [`JsonBlockCodec`]: lenient block decoding behind [`BlockCodec`]
//! - [`NodeEndpoint`]: URL and token discovery from flags or a data directory
//! - [`TaskRunner`]: runs dashboard tasks and posts their events

pub mod address;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod runner;

pub use address::{decode_address, encode_address, validate_addresses};
pub use client::*;
pub use codec::*;
pub use config::*;
pub use error::*;
pub use runner::*;
