//! # skillet-core
//!
//! Shared vocabulary for the skillet workspace: the unified error type, the
//! in-memory manifest model (regular and wildcard dependencies, MCP server and
//! hook declarations), and skill-name safety rules.

pub mod error;
pub mod manifest;
pub mod types;

pub use error::{Result, SkilletError};
pub use manifest::{
    Dependency, HookDecl, Manifest, ManifestDependency, RegularDependency, ServerDecl,
    WildcardDependency, MANIFEST_VERSION, WILDCARD_NAME,
};
pub use types::*;
