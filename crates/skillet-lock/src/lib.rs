//! # skillet-lock
//!
//! What was installed and how to tell whether it changed: a deterministic
//! content hash for skill directories and the `skills.lock` file model.

pub mod integrity;
pub mod lockfile;

pub use integrity::{INTEGRITY_PREFIX, hash_directory};
pub use lockfile::{GitLockEntry, LOCKFILE_VERSION, LocalLockEntry, LockEntry, Lockfile};
