use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use skillet_core::{
    RegularDependency, Result, SKILL_FILE, SkilletError, WildcardDependency, is_safe_skill_name,
};
use skillet_lock::{GitLockEntry, LocalLockEntry, LockEntry};
use skillet_skills::{DiscoveredSkill, discover_all_skills, discover_skill, load_skill_at};
use skillet_source::{CachedCheckout, ObjectCache, SourceSpecifier, looks_like_commit};

/// A dependency pinned to concrete content on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSkill {
    Git {
        name: String,
        source: String,
        resolved_url: String,
        /// Skill directory relative to the checkout root, `/`-separated.
        resolved_path: String,
        resolved_ref: Option<String>,
        commit: String,
        /// Absolute path of the skill inside the cached checkout.
        dir: PathBuf,
    },
    Local {
        name: String,
        source: String,
        dir: PathBuf,
    },
}

impl ResolvedSkill {
    pub fn name(&self) -> &str {
        match self {
            ResolvedSkill::Git { name, .. } | ResolvedSkill::Local { name, .. } => name,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            ResolvedSkill::Git { source, .. } | ResolvedSkill::Local { source, .. } => source,
        }
    }

    pub fn dir(&self) -> &Path {
        match self {
            ResolvedSkill::Git { dir, .. } | ResolvedSkill::Local { dir, .. } => dir,
        }
    }

    pub fn commit(&self) -> Option<&str> {
        match self {
            ResolvedSkill::Git { commit, .. } => Some(commit),
            ResolvedSkill::Local { .. } => None,
        }
    }

    /// Lock entry recording this resolution with the given content hash.
    pub fn lock_entry(&self, integrity: String) -> LockEntry {
        match self {
            ResolvedSkill::Git {
                source,
                resolved_url,
                resolved_path,
                resolved_ref,
                commit,
                ..
            } => LockEntry::Git(GitLockEntry {
                source: source.clone(),
                integrity,
                resolved_url: resolved_url.clone(),
                resolved_path: resolved_path.clone(),
                resolved_ref: resolved_ref.clone(),
                commit: commit.clone(),
            }),
            ResolvedSkill::Local { source, .. } => LockEntry::Local(LocalLockEntry {
                source: source.clone(),
                integrity,
            }),
        }
    }
}

/// Per-call resolution context.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions<'a> {
    /// Local sources are relative to this directory and may not leave it.
    pub project_root: &'a Path,
    /// Commit to pin a git source to, normally taken from the lockfile.
    pub locked_commit: Option<&'a str>,
}

/// Parser + cache + discovery.
pub struct Resolver {
    cache: ObjectCache,
}

impl Resolver {
    pub fn new(cache: ObjectCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    /// Same resolver, but unpinned checkouts are refreshed regardless of age.
    pub fn refreshing(&self) -> Self {
        Self::new(self.cache.fresh())
    }

    /// Resolve one named dependency.
    pub async fn resolve_skill(
        &self,
        name: &str,
        dep: &RegularDependency,
        opts: &ResolveOptions<'_>,
    ) -> Result<ResolvedSkill> {
        let spec = SourceSpecifier::parse(&dep.source)?;
        if let SourceSpecifier::Local(local) = &spec {
            let base = local_dir(name, &local.path, opts.project_root)?;
            let found = match &dep.path {
                Some(p) => Some(load_skill_at(&base, p)?),
                None if base.join(SKILL_FILE).is_file() => None,
                None => Some(
                    discover_skill(&base, name).ok_or_else(|| SkilletError::SkillNotFound {
                        name: name.to_string(),
                        source_str: dep.source.clone(),
                    })?,
                ),
            };
            let dir = match found {
                Some(skill) => contained(&base, &base.join(&skill.relative_path))?,
                None => base,
            };
            debug!(skill = %name, dir = ?dir, "resolved local skill");
            return Ok(ResolvedSkill::Local {
                name: name.to_string(),
                source: dep.source.clone(),
                dir,
            });
        }

        let git_ref = dep.git_ref.as_deref().or(spec.git_ref());
        let checkout = self.checkout(&spec, git_ref, opts.locked_commit).await?;

        let skill = match &dep.path {
            Some(p) => load_skill_at(&checkout.dir, p)?,
            None => discover_skill(&checkout.dir, name).ok_or_else(|| {
                SkilletError::SkillNotFound {
                    name: name.to_string(),
                    source_str: dep.source.clone(),
                }
            })?,
        };
        if skill.name() != name {
            debug!(skill = %name, declared = %skill.name(), "SKILL.md declares a different name");
        }
        let resolved = git_skill(name, &dep.source, &spec, git_ref, &checkout, &skill)?;
        info!(skill = %name, commit = %checkout.commit, "resolved");
        Ok(resolved)
    }

    /// Resolve every skill a wildcard dependency expands to, minus its
    /// exclude list and any name unsafe to use as a directory.
    pub async fn resolve_wildcard(
        &self,
        dep: &WildcardDependency,
        opts: &ResolveOptions<'_>,
    ) -> Result<Vec<ResolvedSkill>> {
        let spec = SourceSpecifier::parse(&dep.source)?;
        let (root, checkout) = match &spec {
            SourceSpecifier::Local(local) => {
                (local_dir("*", &local.path, opts.project_root)?, None)
            }
            _ => {
                let git_ref = dep.git_ref.as_deref().or(spec.git_ref());
                let checkout = self.checkout(&spec, git_ref, opts.locked_commit).await?;
                (checkout.dir.clone(), Some(checkout))
            }
        };

        let mut resolved = Vec::new();
        for skill in discover_all_skills(&root) {
            let name = skill.name().to_string();
            if dep.exclude.iter().any(|e| *e == name) {
                debug!(skill = %name, source = %dep.source, "excluded");
                continue;
            }
            if !is_safe_skill_name(&name) {
                warn!(skill = %name, source = %dep.source, "skipping skill with unsafe name");
                continue;
            }
            let entry = match &checkout {
                Some(checkout) => {
                    let git_ref = dep.git_ref.as_deref().or(spec.git_ref());
                    git_skill(&name, &dep.source, &spec, git_ref, checkout, &skill)?
                }
                None => ResolvedSkill::Local {
                    dir: contained(&root, &root.join(&skill.relative_path))?,
                    name,
                    source: dep.source.clone(),
                },
            };
            resolved.push(entry);
        }

        info!(source = %dep.source, skills = resolved.len(), "expanded wildcard");
        Ok(resolved)
    }

    async fn checkout(
        &self,
        spec: &SourceSpecifier,
        git_ref: Option<&str>,
        locked_commit: Option<&str>,
    ) -> Result<CachedCheckout> {
        let url = spec
            .clone_url()
            .ok_or_else(|| SkilletError::specifier(&spec.to_string(), "not a git source"))?;
        let pin = locked_commit.or(git_ref.filter(|r| looks_like_commit(r)));
        self.cache
            .ensure_cached(url, &spec.cache_key(), git_ref, pin)
            .await
    }
}

fn git_skill(
    name: &str,
    source: &str,
    spec: &SourceSpecifier,
    git_ref: Option<&str>,
    checkout: &CachedCheckout,
    skill: &DiscoveredSkill,
) -> Result<ResolvedSkill> {
    let dir = contained(&checkout.dir, &checkout.dir.join(&skill.relative_path))?;
    let resolved_path = skill
        .relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Ok(ResolvedSkill::Git {
        name: name.to_string(),
        source: source.to_string(),
        resolved_url: spec.clone_url().unwrap_or_default().to_string(),
        resolved_path,
        resolved_ref: git_ref.map(str::to_string),
        commit: checkout.commit.clone(),
        dir,
    })
}

/// Canonical directory for a local source, which must stay inside `root`.
fn local_dir(name: &str, rel: &str, root: &Path) -> Result<PathBuf> {
    let joined = root.join(rel);
    let dir = joined.canonicalize().map_err(|e| {
        SkilletError::resolve(name, format!("{}: {e}", joined.display()))
    })?;
    let dir = contained(root, &dir)?;
    if !dir.is_dir() {
        return Err(SkilletError::resolve(
            name,
            format!("{} is not a directory", dir.display()),
        ));
    }
    Ok(dir)
}

/// Canonicalize `path` and require it to stay under `root`, so symlinks in a
/// checkout or a `../` source cannot reach outside.
fn contained(root: &Path, path: &Path) -> Result<PathBuf> {
    let escape = || SkilletError::PathEscape {
        path: path.display().to_string(),
        root: root.display().to_string(),
    };
    let root = root.canonicalize()?;
    let path = path.canonicalize().map_err(|_| escape())?;
    if path.starts_with(&root) {
        Ok(path)
    } else {
        Err(escape())
    }
}
