#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! HTTP access to the origin content archive
//!
//! Everything relcheck pulls over the network comes through here: the
//! `/latest` version pointer, pack archives, and delta source blobs.
//! Manifests and cached file blobs are read from the local cache and
//! never fetched by this crate.

mod client;
mod fetch;

pub use client::{NetClient, NetConfig};
pub use fetch::latest_version;
