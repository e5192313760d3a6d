//! Domain entities for DevLink.
//!
//! This module contains pure logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code has no transports or UI
//! frameworks and can be tested on any platform without setup.  Its one
//! reach into the OS is [`hash::FileHash::compute_file`], which reads a file
//! through `std::fs`.  Here the domain means: what a file hash is and how it
//! is compared, what the telemetry schema looks like, and how a schema turns
//! into a lookup table.
//!
//! The host crate's cache, configuration and use cases depend on these types;
//! the domain never depends on them.

/// 16-byte content hashes of device files.
pub mod hash;

/// Schema-driven mapping of simulator block slots onto value store positions.
pub mod conversion;

/// The telemetry schema document.
pub mod schema;
