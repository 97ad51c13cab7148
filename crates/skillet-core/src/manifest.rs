use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SkilletError};
use crate::types::is_safe_skill_name;

/// Schema version written into and expected from `skills.toml`.
pub const MANIFEST_VERSION: u32 = 1;

/// Reserved dependency name that expands to every skill in a source.
pub const WILDCARD_NAME: &str = "*";

/// Root of `skills.toml`.
///
/// ```toml
/// version = 1
/// targets = ["claude", "cursor"]
///
/// [[skills]]
/// name = "pdf"
/// source = "anthropics/skills"
///
/// [[skills]]
/// name = "*"
/// source = "git:https://example.com/team/skills.git"
/// exclude = ["experimental"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Agent tools whose skill directories should point at the store.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default, rename = "skills")]
    pub dependencies: Vec<ManifestDependency>,
    /// Universal MCP server declarations, keyed by server name.
    #[serde(default)]
    pub mcp: BTreeMap<String, ServerDecl>,
    #[serde(default)]
    pub hooks: Vec<HookDecl>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            targets: Vec::new(),
            dependencies: Vec::new(),
            mcp: BTreeMap::new(),
            hooks: Vec::new(),
        }
    }
}

/// One `[[skills]]` entry exactly as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDependency {
    pub name: String,
    pub source: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    /// Explicit in-repository path, bypassing discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Only meaningful on the wildcard entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// A named dependency on a single skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularDependency {
    pub name: String,
    pub source: String,
    pub git_ref: Option<String>,
    pub path: Option<String>,
}

/// "Every skill in this source, minus `exclude`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardDependency {
    pub source: String,
    pub git_ref: Option<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Regular(RegularDependency),
    Wildcard(WildcardDependency),
}

impl Dependency {
    pub fn source(&self) -> &str {
        match self {
            Dependency::Regular(d) => &d.source,
            Dependency::Wildcard(d) => &d.source,
        }
    }
}

impl ManifestDependency {
    /// Classify the entry by its name and check the fields that only make
    /// sense for one kind.
    pub fn to_dependency(&self) -> Result<Dependency> {
        if self.name == WILDCARD_NAME {
            if self.path.is_some() {
                return Err(SkilletError::Manifest(format!(
                    "wildcard dependency on '{}' cannot set `path`",
                    self.source
                )));
            }
            return Ok(Dependency::Wildcard(WildcardDependency {
                source: self.source.clone(),
                git_ref: self.git_ref.clone(),
                exclude: self.exclude.clone(),
            }));
        }

        if !is_safe_skill_name(&self.name) {
            return Err(SkilletError::Manifest(format!(
                "invalid skill name '{}'",
                self.name
            )));
        }
        if !self.exclude.is_empty() {
            return Err(SkilletError::Manifest(format!(
                "`exclude` is only allowed on the '{WILDCARD_NAME}' dependency (found on '{}')",
                self.name
            )));
        }
        Ok(Dependency::Regular(RegularDependency {
            name: self.name.clone(),
            source: self.source.clone(),
            git_ref: self.git_ref.clone(),
            path: self.path.clone(),
        }))
    }

    /// A local-path dependency, as recorded when adopting an orphaned skill.
    pub fn local(name: &str, relative_path: &str) -> Self {
        Self {
            name: name.to_string(),
            source: relative_path.to_string(),
            git_ref: None,
            path: None,
            exclude: Vec::new(),
        }
    }
}

/// Universal MCP server declaration. Each agent's config writer turns this
/// into its own native shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Remote (HTTP/SSE) servers use a URL instead of a command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Universal hook declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDecl {
    /// Lifecycle event, e.g. `PreToolUse`.
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    pub command: String,
}

impl Manifest {
    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)
            .map_err(|e| SkilletError::Manifest(format!("invalid manifest: {e}")))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(SkilletError::Manifest(format!(
                "unsupported manifest version {} (expected {MANIFEST_VERSION})",
                manifest.version
            )));
        }
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SkilletError::Manifest(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Load the manifest, or start from an empty one when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(?path, "manifest not found, using empty manifest");
            Ok(Self::default())
        }
    }

    /// Classify every `[[skills]]` entry, in manifest order.
    pub fn dependencies(&self) -> Result<Vec<Dependency>> {
        self.dependencies.iter().map(|d| d.to_dependency()).collect()
    }

    /// Names declared explicitly (everything except the wildcard entries).
    pub fn declared_names(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|d| d.name != WILDCARD_NAME)
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Append a `[[skills]]` entry to the manifest on disk, keeping the user's
    /// formatting and comments intact.
    pub fn append_dependency(path: &Path, dep: &ManifestDependency) -> Result<()> {
        let mut doc = read_document(path)?;

        if doc.get("version").is_none() {
            doc["version"] = toml_edit::value(MANIFEST_VERSION as i64);
        }

        let mut table = toml_edit::Table::new();
        table["name"] = toml_edit::value(&dep.name);
        table["source"] = toml_edit::value(&dep.source);
        if let Some(ref r) = dep.git_ref {
            table["ref"] = toml_edit::value(r);
        }
        if let Some(ref p) = dep.path {
            table["path"] = toml_edit::value(p);
        }
        if !dep.exclude.is_empty() {
            let exclude: toml_edit::Array = dep.exclude.iter().map(|s| s.as_str()).collect();
            table["exclude"] = toml_edit::value(exclude);
        }

        skills_tables(&mut doc)?.push(table);
        write_document(path, &doc)
    }

    /// Drop every `[[skills]]` entry named `name`. Returns whether anything
    /// was removed.
    pub fn remove_dependency(path: &Path, name: &str) -> Result<bool> {
        let mut doc = read_document(path)?;
        let tables = skills_tables(&mut doc)?;
        let before = tables.len();
        tables.retain(|t| t.get("name").and_then(|v| v.as_str()) != Some(name));
        let removed = tables.len() != before;
        if removed {
            write_document(path, &doc)?;
        }
        Ok(removed)
    }
}

fn read_document(path: &Path) -> Result<toml_edit::DocumentMut> {
    let content = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };
    content.parse::<toml_edit::DocumentMut>().map_err(|e| {
        SkilletError::Manifest(format!("invalid TOML in {}: {}", path.display(), e))
    })
}

fn write_document(path: &Path, doc: &toml_edit::DocumentMut) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, doc.to_string()).map_err(|e| {
        SkilletError::Manifest(format!("cannot write {}: {}", path.display(), e))
    })
}

fn skills_tables(doc: &mut toml_edit::DocumentMut) -> Result<&mut toml_edit::ArrayOfTables> {
    // An empty inline `skills = []` is upgraded to an array of tables.
    let replace = match doc.get("skills") {
        None => true,
        Some(item) => item.as_array().is_some_and(|a| a.is_empty()),
    };
    if replace {
        doc["skills"] = toml_edit::Item::ArrayOfTables(toml_edit::ArrayOfTables::new());
    }
    doc["skills"]
        .as_array_of_tables_mut()
        .ok_or_else(|| SkilletError::Manifest("`skills` must be an array of tables".into()))
}
