use std::path::{Path, PathBuf};

use skillet_core::{
    LOCKFILE_FILE, MANIFEST_FILE, Result, ScopeKind, SkilletError, is_safe_skill_name,
};

/// Store location relative to the directory agents live in.
const STORE_DIR: &str = ".agents/skills";

/// Which manifest to operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// `skills.toml` at the root of a project.
    Project(PathBuf),
    /// `~/.agents/skills.toml`, linking into the agents' home directories.
    User(PathBuf),
}

impl Scope {
    /// User scope rooted at the current user's home directory.
    pub fn user() -> Result<Self> {
        dirs::home_dir()
            .map(Scope::User)
            .ok_or_else(|| SkilletError::Config("cannot determine home directory".into()))
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Project(_) => ScopeKind::Project,
            Scope::User(_) => ScopeKind::User,
        }
    }

    pub fn layout(&self) -> ScopeLayout {
        match self {
            Scope::Project(root) => ScopeLayout {
                kind: ScopeKind::Project,
                root: root.clone(),
                targets_base: root.clone(),
                manifest_path: root.join(MANIFEST_FILE),
                lock_path: root.join(LOCKFILE_FILE),
                store_dir: root.join(STORE_DIR),
            },
            Scope::User(home) => {
                let root = home.join(".agents");
                ScopeLayout {
                    kind: ScopeKind::User,
                    manifest_path: root.join(MANIFEST_FILE),
                    lock_path: root.join(LOCKFILE_FILE),
                    store_dir: home.join(STORE_DIR),
                    targets_base: home.clone(),
                    root,
                }
            }
        }
    }
}

/// Concrete paths for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeLayout {
    pub kind: ScopeKind,
    /// Directory holding the manifest; local sources are relative to it.
    pub root: PathBuf,
    /// Directory the agent folders (`.claude`, `.cursor`, ...) live in.
    pub targets_base: PathBuf,
    pub manifest_path: PathBuf,
    pub lock_path: PathBuf,
    pub store_dir: PathBuf,
}

impl ScopeLayout {
    pub fn store_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(name)
    }

    /// `store_path` for callers about to write or delete: names that could
    /// leave the store are refused.
    pub fn skill_dir(&self, name: &str) -> Result<PathBuf> {
        if !is_safe_skill_name(name) {
            return Err(SkilletError::PathEscape {
                path: name.to_string(),
                root: self.store_dir.display().to_string(),
            });
        }
        Ok(self.store_path(name))
    }

    /// Source string for a skill that lives in the store itself, relative to
    /// the manifest directory (`./.agents/skills/<name>` in a project).
    pub fn store_source(&self, name: &str) -> String {
        let rel = self
            .store_dir
            .strip_prefix(&self.root)
            .unwrap_or(Path::new(STORE_DIR));
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("./{rel}/{name}")
    }
}
