//! Infrastructure layer for the DevLink host.
//!
//! Contains the OS-facing adapters: configuration and schema files, and the
//! on-disk device file cache.  Transports (UDP sockets, serial ports, USB
//! endpoints) are supplied by the embedding application, which hands raw
//! bytes to [`crate::application::link::DeviceLink`].
//!
//! **Dependency rule**: this layer may depend on `devlink_core`, but MUST NOT
//! be imported by the domain layer.

pub mod storage;
