use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Manifest file name at the root of a scope.
pub const MANIFEST_FILE: &str = "skills.toml";

/// Lockfile name, sitting next to the manifest.
pub const LOCKFILE_FILE: &str = "skills.lock";

/// The file that marks a directory as a skill.
pub const SKILL_FILE: &str = "SKILL.md";

static SKILL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("valid regex"));

/// Whether `name` is safe to use as a single directory component in the store.
///
/// Skill names can come from manifest content inside a third-party repository,
/// so they are checked before ever being joined onto a filesystem path.
pub fn is_safe_skill_name(name: &str) -> bool {
    SKILL_NAME_RE.is_match(name) && !name.contains("..")
}

/// Where a manifest lives: inside a project, or in the user's home directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Project,
    User,
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeKind::Project => write!(f, "project"),
            ScopeKind::User => write!(f, "user"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_names() {
        assert!(is_safe_skill_name("pdf"));
        assert!(is_safe_skill_name("code-review"));
        assert!(is_safe_skill_name("v1.2_beta"));
        assert!(is_safe_skill_name("A1"));
    }

    #[test]
    fn unsafe_names() {
        assert!(!is_safe_skill_name(""));
        assert!(!is_safe_skill_name("../etc"));
        assert!(!is_safe_skill_name("a/b"));
        assert!(!is_safe_skill_name(".hidden"));
        assert!(!is_safe_skill_name("-flag"));
        assert!(!is_safe_skill_name("a..b"));
        assert!(!is_safe_skill_name("has space"));
        assert!(!is_safe_skill_name(&"x".repeat(129)));
    }
}
