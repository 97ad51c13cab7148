use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use skillet_core::{Dependency, RegularDependency, Result, SkilletError, WILDCARD_NAME};
use skillet_lock::Lockfile;
use skillet_source::SourceSpecifier;

use crate::resolver::{ResolveOptions, ResolvedSkill, Resolver};

/// Which lock pins to honor while resolving.
#[derive(Debug, Clone, Copy)]
pub enum PinPolicy<'a> {
    /// Pin everything the lockfile records.
    UseLock,
    /// Resolve everything afresh.
    IgnoreAll,
    /// Resolve these names afresh, pin the rest.
    IgnoreFor(&'a [String]),
}

impl PinPolicy<'_> {
    fn honors(&self, name: &str) -> bool {
        match self {
            PinPolicy::UseLock => true,
            PinPolicy::IgnoreAll => false,
            PinPolicy::IgnoreFor(names) => !names.iter().any(|n| n == name),
        }
    }
}

/// One skill the manifest expects, resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedSkill {
    pub skill: ResolvedSkill,
    /// Source of the wildcard that produced it, if any.
    pub wildcard: Option<String>,
}

/// Reject manifests that name a skill twice or wildcard one source twice.
pub fn validate_dependencies(deps: &[Dependency]) -> Result<()> {
    let mut names = HashSet::new();
    let mut wildcards: Vec<(SourceSpecifier, &str)> = Vec::new();

    for dep in deps {
        match dep {
            Dependency::Regular(d) => {
                if !names.insert(d.name.as_str()) {
                    return Err(SkilletError::Manifest(format!(
                        "skill '{}' is declared more than once",
                        d.name
                    )));
                }
            }
            Dependency::Wildcard(w) => {
                let spec = SourceSpecifier::parse(&w.source)?;
                if let Some((_, first)) = wildcards.iter().find(|(s, _)| s.same_repository(&spec)) {
                    return Err(SkilletError::WildcardConflict {
                        name: WILDCARD_NAME.to_string(),
                        first: first.to_string(),
                        second: w.source.clone(),
                    });
                }
                wildcards.push((spec, &w.source));
            }
        }
    }
    Ok(())
}

/// Resolve every dependency, regular ones first in manifest order, then
/// wildcard expansions. A regular dependency's name always beats a wildcard;
/// two wildcards producing the same unclaimed name is a conflict.
pub async fn expand_dependencies(
    resolver: &Resolver,
    deps: &[Dependency],
    project_root: &Path,
    lock: Option<&Lockfile>,
    pins: PinPolicy<'_>,
) -> Result<Vec<ExpandedSkill>> {
    validate_dependencies(deps)?;

    let mut expanded = Vec::new();
    let mut claimed: HashSet<String> = HashSet::new();

    for dep in deps {
        let Dependency::Regular(d) = dep else {
            continue;
        };
        let locked_commit = lock
            .filter(|_| pins.honors(&d.name))
            .and_then(|l| regular_pin(l, d));
        let opts = ResolveOptions {
            project_root,
            locked_commit,
        };
        let skill = resolver.resolve_skill(&d.name, d, &opts).await?;
        claimed.insert(d.name.clone());
        expanded.push(ExpandedSkill {
            skill,
            wildcard: None,
        });
    }

    // Name -> wildcard source that produced it.
    let mut from_wildcard: HashMap<String, String> = HashMap::new();
    for dep in deps {
        let Dependency::Wildcard(w) = dep else {
            continue;
        };
        let effective_ref = match (&w.git_ref, SourceSpecifier::parse(&w.source)?.git_ref()) {
            (Some(r), _) => Some(r.clone()),
            (None, r) => r.map(str::to_string),
        };
        let locked_commit = lock
            .filter(|_| !matches!(pins, PinPolicy::IgnoreAll))
            .and_then(|l| wildcard_pin(l, &w.source, effective_ref.as_deref(), &claimed, pins));
        let opts = ResolveOptions {
            project_root,
            locked_commit,
        };

        for skill in resolver.resolve_wildcard(w, &opts).await? {
            let name = skill.name().to_string();
            if claimed.contains(&name) {
                debug!(skill = %name, source = %w.source, "claimed by a named dependency");
                continue;
            }
            if let Some(first) = from_wildcard.get(&name) {
                return Err(SkilletError::WildcardConflict {
                    name,
                    first: first.clone(),
                    second: w.source.clone(),
                });
            }
            from_wildcard.insert(name, w.source.clone());
            expanded.push(ExpandedSkill {
                skill,
                wildcard: Some(w.source.clone()),
            });
        }
    }

    Ok(expanded)
}

/// The locked commit for a named dependency, unless its source or ref
/// changed since it was locked.
fn regular_pin<'l>(lock: &'l Lockfile, dep: &RegularDependency) -> Option<&'l str> {
    let skillet_lock::LockEntry::Git(entry) = lock.get(&dep.name)? else {
        return None;
    };
    if entry.source != dep.source {
        return None;
    }
    let effective_ref = dep.git_ref.clone().or_else(|| {
        SourceSpecifier::parse(&dep.source)
            .ok()
            .and_then(|s| s.git_ref().map(str::to_string))
    });
    (entry.resolved_ref == effective_ref).then_some(entry.commit.as_str())
}

/// The commit a wildcard expanded at last time. Only entries the wildcard
/// produced count, so names claimed by regular dependencies on the same
/// source never lend their pin. Disagreeing entries, or any produced name
/// that `pins` asks to re-resolve, leave the wildcard unpinned.
fn wildcard_pin<'l>(
    lock: &'l Lockfile,
    source: &str,
    effective_ref: Option<&str>,
    claimed: &HashSet<String>,
    pins: PinPolicy<'_>,
) -> Option<&'l str> {
    let mut commit = None;
    for (name, entry) in &lock.skills {
        let skillet_lock::LockEntry::Git(e) = entry else {
            continue;
        };
        if e.source != source || claimed.contains(name) {
            continue;
        }
        if !pins.honors(name) || e.resolved_ref.as_deref() != effective_ref {
            return None;
        }
        match commit {
            None => commit = Some(e.commit.as_str()),
            Some(c) if c == e.commit => {}
            Some(_) => return None,
        }
    }
    commit
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillet_core::{RegularDependency, WildcardDependency};

    fn regular(name: &str, source: &str) -> Dependency {
        Dependency::Regular(RegularDependency {
            name: name.into(),
            source: source.into(),
            git_ref: None,
            path: None,
        })
    }

    fn wildcard(source: &str) -> Dependency {
        Dependency::Wildcard(WildcardDependency {
            source: source.into(),
            git_ref: None,
            exclude: Vec::new(),
        })
    }

    #[test]
    fn duplicate_names_rejected() {
        let deps = [regular("pdf", "a/b"), regular("pdf", "c/d")];
        assert!(matches!(
            validate_dependencies(&deps),
            Err(SkilletError::Manifest(_))
        ));
    }

    #[test]
    fn duplicate_wildcard_sources_rejected() {
        let deps = [
            wildcard("anthropics/skills"),
            wildcard("https://github.com/Anthropics/skills.git"),
        ];
        assert!(matches!(
            validate_dependencies(&deps),
            Err(SkilletError::WildcardConflict { .. })
        ));
    }

    #[test]
    fn distinct_wildcards_ok() {
        let deps = [wildcard("a/one"), wildcard("a/two"), regular("pdf", "a/one")];
        validate_dependencies(&deps).unwrap();
    }

    #[test]
    fn pin_policy() {
        let names = vec!["pdf".to_string()];
        assert!(PinPolicy::UseLock.honors("pdf"));
        assert!(!PinPolicy::IgnoreAll.honors("pdf"));
        assert!(!PinPolicy::IgnoreFor(&names).honors("pdf"));
        assert!(PinPolicy::IgnoreFor(&names).honors("review"));
    }

    #[test]
    fn regular_pin_follows_source_and_ref() {
        let mut lock = Lockfile::new();
        lock.insert(
            "pdf",
            skillet_lock::LockEntry::Git(skillet_lock::GitLockEntry {
                source: "a/b".into(),
                integrity: "sha256-x".into(),
                resolved_url: "https://github.com/a/b.git".into(),
                resolved_path: "pdf".into(),
                resolved_ref: None,
                commit: "f".repeat(40),
            }),
        );
        let mut dep = RegularDependency {
            name: "pdf".into(),
            source: "a/b".into(),
            git_ref: None,
            path: None,
        };
        assert_eq!(regular_pin(&lock, &dep), Some("f".repeat(40).as_str()));

        dep.git_ref = Some("v2".into());
        assert_eq!(regular_pin(&lock, &dep), None);

        dep.git_ref = None;
        dep.source = "a/c".into();
        assert_eq!(regular_pin(&lock, &dep), None);
    }

    fn git_entry(source: &str, commit: char) -> skillet_lock::LockEntry {
        skillet_lock::LockEntry::Git(skillet_lock::GitLockEntry {
            source: source.into(),
            integrity: "sha256-x".into(),
            resolved_url: "https://github.com/a/b.git".into(),
            resolved_path: "x".into(),
            resolved_ref: None,
            commit: commit.to_string().repeat(40),
        })
    }

    #[test]
    fn wildcard_pin_skips_claimed_names() {
        let mut lock = Lockfile::new();
        // Regular dependency on the same repo, pinned to an older commit.
        lock.insert("pdf", git_entry("a/b", 'a'));
        lock.insert("review", git_entry("a/b", 'b'));
        lock.insert("tables", git_entry("a/b", 'b'));
        lock.insert("other", git_entry("c/d", 'c'));

        let claimed: HashSet<String> = ["pdf".to_string()].into();
        let newer = "b".repeat(40);
        assert_eq!(
            wildcard_pin(&lock, "a/b", None, &claimed, PinPolicy::UseLock),
            Some(newer.as_str())
        );

        // Without the claim the entries disagree.
        assert_eq!(
            wildcard_pin(&lock, "a/b", None, &HashSet::new(), PinPolicy::UseLock),
            None
        );
    }

    #[test]
    fn wildcard_pin_released_by_update() {
        let mut lock = Lockfile::new();
        lock.insert("review", git_entry("a/b", 'b'));
        let names = vec!["review".to_string()];
        let claimed = HashSet::new();
        assert_eq!(
            wildcard_pin(&lock, "a/b", None, &claimed, PinPolicy::IgnoreFor(&names)),
            None
        );
        assert_eq!(
            wildcard_pin(&lock, "a/b", Some("v2"), &claimed, PinPolicy::UseLock),
            None
        );
    }
}
