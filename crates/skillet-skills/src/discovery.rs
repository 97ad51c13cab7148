use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use skillet_core::{SKILL_FILE, SkilletError};

use crate::definition::SkillDefinition;

/// Conventional parents of skill directories, in priority order, after the
/// repository root itself.
const SKILL_ROOTS: [&str; 3] = ["skills", ".claude/skills", ".agents/skills"];

/// Marketplace layout: `plugins/<plugin>/skills/<skill>`.
const PLUGINS_DIR: &str = "plugins";

/// A skill found inside a checkout.
#[derive(Debug, Clone)]
pub struct DiscoveredSkill {
    /// Directory of the skill relative to the checkout root (`.` for the root).
    pub relative_path: PathBuf,
    pub definition: SkillDefinition,
}

impl DiscoveredSkill {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// Find the skill called `name` in `checkout`, trying the conventional
/// locations in priority order. First parseable SKILL.md wins.
pub fn discover_skill(checkout: &Path, name: &str) -> Option<DiscoveredSkill> {
    let mut candidates: Vec<PathBuf> = vec![PathBuf::from(name)];
    candidates.extend(SKILL_ROOTS.iter().map(|root| Path::new(root).join(name)));
    candidates.extend(
        plugin_skill_roots(checkout)
            .into_iter()
            .map(|root| root.join(name)),
    );

    for rel in candidates {
        if let Some(found) = load_candidate(checkout, &rel) {
            debug!(skill = %name, path = ?rel, "discovered skill");
            return Some(found);
        }
    }

    // A repository that *is* a single skill.
    load_candidate(checkout, Path::new("."))
        .filter(|found| found.definition.name == name)
}

/// Find every skill in `checkout`. Skills are deduplicated by the name their
/// SKILL.md declares; the first one found in priority order wins. Malformed
/// SKILL.md files are skipped.
pub fn discover_all_skills(checkout: &Path) -> Vec<DiscoveredSkill> {
    let mut parents: Vec<PathBuf> = vec![PathBuf::new()];
    parents.extend(SKILL_ROOTS.iter().map(PathBuf::from));
    parents.extend(plugin_skill_roots(checkout));

    let mut seen = HashSet::new();
    let mut found = Vec::new();

    let mut push = |skill: DiscoveredSkill, found: &mut Vec<DiscoveredSkill>| {
        if seen.insert(skill.definition.name.clone()) {
            found.push(skill);
        } else {
            debug!(
                skill = %skill.definition.name,
                path = ?skill.relative_path,
                "skill already found at a higher-priority location, skipping"
            );
        }
    };

    for parent in parents {
        for child in sorted_subdirs(&checkout.join(&parent)) {
            let rel = parent.join(&child);
            if let Some(skill) = load_candidate(checkout, &rel) {
                push(skill, &mut found);
            }
        }
    }

    if let Some(root_skill) = load_candidate(checkout, Path::new(".")) {
        push(root_skill, &mut found);
    }

    found
}

/// Load the skill at an explicit path inside `checkout`. Used when a
/// dependency names its `path` instead of relying on discovery.
pub fn load_skill_at(checkout: &Path, relative: &str) -> skillet_core::Result<DiscoveredSkill> {
    let rel = Path::new(relative);
    let escapes = rel.is_absolute()
        || rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(SkilletError::PathEscape {
            path: relative.to_string(),
            root: checkout.display().to_string(),
        });
    }

    let skill_md = checkout.join(rel).join(SKILL_FILE);
    if !skill_md.is_file() {
        return Err(SkilletError::InvalidSkill {
            path: skill_md.display().to_string(),
            reason: format!("no {SKILL_FILE} at '{relative}'"),
        });
    }
    let definition = SkillDefinition::from_file(&skill_md)?;
    Ok(DiscoveredSkill {
        relative_path: normalize_relative(rel),
        definition,
    })
}

fn load_candidate(checkout: &Path, rel: &Path) -> Option<DiscoveredSkill> {
    let dir = checkout.join(rel);
    // Symlinked directories are never followed out of the checkout.
    let meta = std::fs::symlink_metadata(&dir).ok()?;
    if !meta.is_dir() {
        return None;
    }
    let skill_md = dir.join(SKILL_FILE);
    if !skill_md.is_file() {
        return None;
    }
    match SkillDefinition::from_file(&skill_md) {
        Ok(definition) => Some(DiscoveredSkill {
            relative_path: normalize_relative(rel),
            definition,
        }),
        Err(e) => {
            warn!(path = ?skill_md, error = %e, "skipping malformed skill");
            None
        }
    }
}

/// `plugins/<plugin>/skills` for every plugin directory, sorted by plugin name.
fn plugin_skill_roots(checkout: &Path) -> Vec<PathBuf> {
    sorted_subdirs(&checkout.join(PLUGINS_DIR))
        .into_iter()
        .map(|plugin| Path::new(PLUGINS_DIR).join(plugin).join("skills"))
        .collect()
}

/// Names of real (non-symlink, non-hidden) subdirectories, sorted.
fn sorted_subdirs(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}

fn normalize_relative(rel: &Path) -> PathBuf {
    let cleaned: PathBuf = rel
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}
