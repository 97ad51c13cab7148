//! # skillet-source
//!
//! Turns dependency source strings into typed specifiers and keeps an on-disk
//! cache of git checkouts for them.
//!
//! All network access goes through the external `git` executable via the
//! [`GitClient`] trait. Source strings are validated here before any of their
//! text reaches a git argument vector.

pub mod cache;
pub mod git;
pub mod specifier;

pub use cache::{CacheSettings, CachedCheckout, ObjectCache};
pub use git::{GitClient, ProcessGit};
pub use specifier::{GitHubSource, GitSource, LocalSource, SourceSpecifier, looks_like_commit};
