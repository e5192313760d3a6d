//! Storage infrastructure: configuration, telemetry schema and the device file cache.
//!
//! This module is the thin adapter between the application and the file
//! system:
//!
//! - `config` reads and writes the host's TOML configuration, providing
//!   defaults on first run.
//! - `schema` loads the telemetry schema document.
//! - `cache` keeps verified copies of device files so unchanged files are not
//!   downloaded again.
//!
//! Keeping storage concerns here, rather than scattered through the use
//! cases, means the on-disk layout can change without touching the protocol
//! or application code.

pub mod cache;
pub mod config;
pub mod schema;
