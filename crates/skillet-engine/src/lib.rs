//! # skillet-engine
//!
//! Turns a manifest into installed skills.
//!
//! - [`resolver`]: dependency → concrete snapshot (git commit or local dir)
//! - [`expand`]: regular + wildcard dependencies → the set of expected names
//! - [`store`]: copies snapshots into the managed store
//! - [`symlink`]: points each agent's `skills` entry at the store
//! - [`agents`]: built-in agent targets and MCP/hook config writers
//! - [`installer`]: `install`, `update`, `remove`, `list`
//! - [`sync`]: drift detection and repair

pub mod agents;
pub mod expand;
pub mod installer;
pub mod resolver;
pub mod scope;
pub mod store;
pub mod symlink;
pub mod sync;
pub mod trust;

pub use agents::{
    AgentTarget, ConfigFile, ConfigPolicy, ConfigWriter, JsonConfigWriter, agent_target,
    known_targets, reconcile_agent_configs, writer_for,
};
pub use expand::{ExpandedSkill, PinPolicy, expand_dependencies, validate_dependencies};
pub use installer::{InstallOptions, InstallReport, InstalledSkill, Installer, ListEntry};
pub use resolver::{ResolveOptions, ResolvedSkill, Resolver};
pub use scope::{Scope, ScopeLayout};
pub use symlink::{SymlinkOutcome, ensure_skills_symlink, verify_symlinks};
pub use sync::{IssueKind, SyncIssue, SyncReport};
pub use trust::{AllowAll, AllowList, TrustGate};
