//! Application layer use cases for the DevLink host.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure protocol rules in `devlink-core`) and the infrastructure (file
//! system, configuration, transports).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** core types to fulfil one goal (e.g., "bring this device
//!   file into the cache").
//! - **Depend on abstractions** such as [`telemetry::ValueStore`] rather than
//!   concrete stores, so they can be tested with mocks.
//! - **Never open sockets or serial ports**: callers move the bytes.
//!
//! # Sub-modules
//!
//! - **`link`**          – Per-transport framing, counter and checksum state.
//!   Every byte to or from a device passes through a `DeviceLink`.
//!
//! - **`file_transfer`** – Downloads a device file chunk by chunk into the
//!   cache and verifies it against the hash the device reported.
//!
//! - **`telemetry`**     – Routes simulator data blocks into the value store
//!   through the conversion table.

pub mod file_transfer;
pub mod link;
pub mod telemetry;
