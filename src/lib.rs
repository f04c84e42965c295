//! An IPAM plugin for flat container networks.
//!
//! Containers get either the address passed in `CNI_ARGS` or the one the Rancher metadata
//! service has reserved for them, plus the configured static routes and a host route to the
//! metadata service through the bridge.

#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod args;
pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod plugin;
pub mod resolver;
pub mod result;
