//! Container and record archive access
//!
//! A container archive is a ZIP on disk holding record archives (nested ZIPs)
//! under a conventional path prefix. Record archives are small enough to be
//! read into memory whole; lookups inside them descend into further nested
//! archives up to a fixed depth.
//!
//! All functions here are blocking. The pipeline runs them on the blocking
//! thread pool.

pub mod naming;
mod zip;

pub use self::zip::{ContainerArchive, RecordArchive, RecordEntry};
pub use naming::{bag_identifier, base_name, container_name, is_record_entry, record_name};
