#![doc = include_str!("../README.md")]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod client;
mod container;
mod error;

pub use client::Client;
pub use container::{find_primary_ip, Container};
pub use error::Error;

/// Address of the metadata service when none is configured
pub const DEFAULT_METADATA_ADDRESS: &str = "169.254.169.250";

/// Metadata API version this client speaks
pub const API_VERSION: &str = "2016-07-29";
