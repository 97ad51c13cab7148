use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use skillet_core::{Result, SkilletError, is_safe_skill_name};

/// Current `skills.lock` format version.
pub const LOCKFILE_VERSION: u32 = 1;

const HEADER: &str = "# Generated by skillet. Do not edit by hand.\n\n";

/// The `skills.lock` file: one entry per installed skill, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,
    #[serde(default)]
    pub skills: BTreeMap<String, LockEntry>,
}

/// How a skill was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LockEntry {
    Git(GitLockEntry),
    Local(LocalLockEntry),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLockEntry {
    /// Source string as written in the manifest.
    pub source: String,
    pub integrity: String,
    /// URL the checkout was cloned from.
    pub resolved_url: String,
    /// Skill directory relative to the checkout root.
    pub resolved_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_ref: Option<String>,
    pub commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalLockEntry {
    pub source: String,
    pub integrity: String,
}

impl LockEntry {
    pub fn source(&self) -> &str {
        match self {
            LockEntry::Git(e) => &e.source,
            LockEntry::Local(e) => &e.source,
        }
    }

    pub fn integrity(&self) -> &str {
        match self {
            LockEntry::Git(e) => &e.integrity,
            LockEntry::Local(e) => &e.integrity,
        }
    }

    /// Pinned commit, for git-backed entries.
    pub fn commit(&self) -> Option<&str> {
        match self {
            LockEntry::Git(e) => Some(&e.commit),
            LockEntry::Local(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LockEntry::Git(_) => "git",
            LockEntry::Local(_) => "local",
        }
    }
}

impl Default for Lockfile {
    fn default() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            skills: BTreeMap::new(),
        }
    }
}

impl Lockfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse lockfile content, rejecting unknown versions before looking at
    /// the rest of the document. Keys must be safe skill names since they
    /// become store directory names.
    pub fn from_toml(content: &str) -> Result<Self> {
        let table: toml::Table =
            toml::from_str(content).map_err(|e| SkilletError::Lockfile(e.to_string()))?;
        match table.get("version").and_then(|v| v.as_integer()) {
            Some(v) if v == i64::from(LOCKFILE_VERSION) => {}
            Some(v) => {
                return Err(SkilletError::Lockfile(format!(
                    "unsupported lockfile version {v} (expected {LOCKFILE_VERSION})"
                )));
            }
            None => return Err(SkilletError::Lockfile("missing `version`".into())),
        }
        let lock: Self = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| SkilletError::Lockfile(e.to_string()))?;
        if let Some(bad) = lock.skills.keys().find(|k| !is_safe_skill_name(k)) {
            return Err(SkilletError::Lockfile(format!(
                "invalid skill name '{bad}' in lockfile"
            )));
        }
        Ok(lock)
    }

    /// Load from disk. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::from_toml(&content)
            .map(Some)
            .map_err(|e| match e {
                SkilletError::Lockfile(msg) => {
                    SkilletError::Lockfile(format!("{}: {msg}", path.display()))
                }
                other => other,
            })
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(format!("{HEADER}{}", toml::to_string(self)?))
    }

    /// Write atomically: a temp file in the same directory is renamed over
    /// `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| SkilletError::Io(e.error))?;
        debug!(path = ?path, skills = self.skills.len(), "wrote lockfile");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LockEntry> {
        self.skills.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: LockEntry) {
        self.skills.insert(name.into(), entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<LockEntry> {
        self.skills.remove(name)
    }

    /// Drop entries whose name `keep` rejects; returns the dropped names.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let dropped: Vec<String> = self
            .skills
            .keys()
            .filter(|name| !keep(name))
            .cloned()
            .collect();
        for name in &dropped {
            self.skills.remove(name);
        }
        dropped
    }
}
