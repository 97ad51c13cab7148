use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use skillet_core::{Dependency, Manifest, Result, SkilletError};
use skillet_lock::{LockEntry, Lockfile, hash_directory};
use skillet_source::SourceSpecifier;

use crate::agents::{AgentTarget, agent_target, reconcile_agent_configs};
use crate::expand::{ExpandedSkill, PinPolicy, expand_dependencies};
use crate::resolver::Resolver;
use crate::scope::ScopeLayout;
use crate::store::{install_copy, remove_if_exists};
use crate::symlink::{SymlinkOutcome, ensure_skills_symlink};
use crate::sync::{IssueKind, SyncIssue};
use crate::trust::{AllowAll, TrustGate};

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Refuse to change the lockfile; abort unless everything matches it.
    pub frozen: bool,
    /// Ignore lock pins and resolve every dependency afresh.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledSkill {
    pub name: String,
    pub source: String,
    pub commit: Option<String>,
    pub integrity: String,
    /// Whether the store copy was (re)written by this run.
    pub changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub installed: Vec<InstalledSkill>,
    /// Skills dropped from the lockfile and store because nothing declares
    /// them any more.
    pub pruned: Vec<String>,
    pub symlinks: Vec<(String, SymlinkOutcome)>,
    pub issues: Vec<SyncIssue>,
}

/// One row of `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub name: String,
    /// Named explicitly in the manifest (as opposed to via a wildcard).
    pub declared: bool,
    pub locked: Option<LockEntry>,
    pub installed: bool,
}

/// How one reconcile pass behaves.
pub(crate) struct Pass<'a> {
    pub resolver: &'a Resolver,
    pub pins: PinPolicy<'a>,
    pub frozen: bool,
    /// Skills whose store copy and lock entry are left exactly as they are.
    pub keep: &'a HashSet<String>,
}

/// Install, update, remove and list skills for one scope.
pub struct Installer {
    layout: ScopeLayout,
    resolver: Resolver,
    trust: Box<dyn TrustGate>,
    default_targets: Vec<String>,
}

impl Installer {
    pub fn new(layout: ScopeLayout, resolver: Resolver) -> Self {
        Self {
            layout,
            resolver,
            trust: Box::new(AllowAll),
            default_targets: vec!["claude".to_string()],
        }
    }

    pub fn with_trust(mut self, gate: impl TrustGate + 'static) -> Self {
        self.trust = Box::new(gate);
        self
    }

    /// Targets used when the manifest names none.
    pub fn with_default_targets(mut self, targets: Vec<String>) -> Self {
        self.default_targets = targets;
        self
    }

    pub fn layout(&self) -> &ScopeLayout {
        &self.layout
    }

    pub(crate) fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Install everything the manifest declares.
    pub async fn install(&self, opts: InstallOptions) -> Result<InstallReport> {
        if opts.frozen && opts.force {
            return Err(SkilletError::Config(
                "--frozen and --force cannot be combined".into(),
            ));
        }
        let manifest = Manifest::load_or_default(&self.layout.manifest_path)?;
        let lock = Lockfile::load(&self.layout.lock_path)?;
        let keep = HashSet::new();
        self.reconcile(
            &manifest,
            lock,
            Pass {
                resolver: &self.resolver,
                pins: if opts.force {
                    PinPolicy::IgnoreAll
                } else {
                    PinPolicy::UseLock
                },
                frozen: opts.frozen,
                keep: &keep,
            },
        )
        .await
    }

    /// Re-resolve `names` (everything when empty) ignoring their lock pins,
    /// refreshing cached checkouts regardless of age.
    pub async fn update(&self, names: &[String]) -> Result<InstallReport> {
        let manifest = Manifest::load_or_default(&self.layout.manifest_path)?;
        let lock = Lockfile::load(&self.layout.lock_path)?;

        for name in names {
            self.layout.skill_dir(name)?;
            let declared = manifest.declared_names().contains(&name.as_str());
            let locked = lock.as_ref().is_some_and(|l| l.get(name).is_some());
            if !declared && !locked {
                return Err(SkilletError::resolve(name, "not declared in the manifest"));
            }
        }

        let refreshing = self.resolver.refreshing();
        let keep = HashSet::new();
        let pins = if names.is_empty() {
            PinPolicy::IgnoreAll
        } else {
            PinPolicy::IgnoreFor(names)
        };
        self.reconcile(
            &manifest,
            lock,
            Pass {
                resolver: &refreshing,
                pins,
                frozen: false,
                keep: &keep,
            },
        )
        .await
    }

    /// Remove a named skill from the manifest, the lockfile and the store.
    pub fn remove(&self, name: &str) -> Result<()> {
        let store = self.layout.skill_dir(name)?;
        let manifest = Manifest::load_or_default(&self.layout.manifest_path)?;
        let mut lock = Lockfile::load(&self.layout.lock_path)?.unwrap_or_default();

        let declared = manifest.declared_names().contains(&name);
        if !declared {
            if let Some(entry) = lock.get(name) {
                let wildcard = manifest.dependencies()?.into_iter().find_map(|d| match d {
                    Dependency::Wildcard(w) if w.source == entry.source() => Some(w.source),
                    _ => None,
                });
                if let Some(source) = wildcard {
                    return Err(SkilletError::resolve(
                        name,
                        format!("provided by the wildcard on {source}; add it to that entry's `exclude` instead"),
                    ));
                }
            }
        }

        let removed_manifest = declared
            && Manifest::remove_dependency(&self.layout.manifest_path, name)?;
        let removed_lock = lock.remove(name).is_some();
        let removed_store = store.is_dir();

        if !removed_manifest && !removed_lock && !removed_store {
            return Err(SkilletError::resolve(name, "not installed"));
        }
        if removed_lock {
            lock.save(&self.layout.lock_path)?;
        }
        remove_if_exists(&store)?;
        info!(skill = %name, "removed");
        Ok(())
    }

    /// Declared and locked skills, sorted by name.
    pub fn list(&self) -> Result<Vec<ListEntry>> {
        let manifest = Manifest::load_or_default(&self.layout.manifest_path)?;
        let lock = Lockfile::load(&self.layout.lock_path)?.unwrap_or_default();

        let mut names: Vec<String> = manifest
            .declared_names()
            .into_iter()
            .map(str::to_string)
            .chain(lock.skills.keys().cloned())
            .collect();
        names.sort();
        names.dedup();

        let declared = manifest.declared_names();
        Ok(names
            .into_iter()
            .map(|name| ListEntry {
                declared: declared.contains(&name.as_str()),
                locked: lock.get(&name).cloned(),
                installed: self.layout.store_path(&name).is_dir(),
                name,
            })
            .collect())
    }

    /// Built-in targets for the manifest, plus an `error` issue per unknown
    /// target name.
    pub(crate) fn targets(&self, manifest: &Manifest) -> (Vec<&'static AgentTarget>, Vec<SyncIssue>) {
        let names = if manifest.targets.is_empty() {
            &self.default_targets
        } else {
            &manifest.targets
        };
        let mut targets: Vec<&'static AgentTarget> = Vec::new();
        let mut issues = Vec::new();
        for name in names {
            match agent_target(name) {
                Some(t) if !targets.iter().any(|seen| seen.name == t.name) => targets.push(t),
                Some(_) => {}
                None => {
                    warn!(agent = %name, "unknown agent target");
                    issues.push(SyncIssue::error(name.clone(), "unknown agent target"));
                }
            }
        }
        (targets, issues)
    }

    /// Resolve, verify, copy, lock, link. Shared by install, update and sync.
    pub(crate) async fn reconcile(
        &self,
        manifest: &Manifest,
        lock: Option<Lockfile>,
        pass: Pass<'_>,
    ) -> Result<InstallReport> {
        let deps = manifest.dependencies()?;
        self.check_trust(&deps)?;
        if pass.frozen && lock.is_none() {
            return Err(SkilletError::FrozenLockfile(format!(
                "{} does not exist",
                self.layout.lock_path.display()
            )));
        }

        let expanded = expand_dependencies(
            pass.resolver,
            &deps,
            &self.layout.root,
            lock.as_ref(),
            pass.pins,
        )
        .await?;

        if let (true, Some(locked)) = (pass.frozen, lock.as_ref()) {
            self.verify_frozen(&expanded, locked)?;
        }

        let mut report = InstallReport::default();
        let mut next = Lockfile::new();
        for item in &expanded {
            let name = item.skill.name();
            if pass.keep.contains(name) {
                if let Some(entry) = lock.as_ref().and_then(|l| l.get(name)) {
                    next.insert(name, entry.clone());
                }
                debug!(skill = %name, "leaving store copy untouched");
                continue;
            }

            let dest = self.layout.skill_dir(name)?;
            let source_hash = hash_directory(item.skill.dir())?;
            let current = if dest.is_dir() {
                Some(hash_directory(&dest)?)
            } else {
                None
            };
            let changed = current.as_deref() != Some(source_hash.as_str());
            let integrity = if changed {
                install_copy(item.skill.dir(), &dest)?;
                hash_directory(&dest)?
            } else {
                source_hash
            };
            if changed {
                info!(skill = %name, integrity = %integrity, "installed");
            }

            next.insert(name, item.skill.lock_entry(integrity.clone()));
            report.installed.push(InstalledSkill {
                name: name.to_string(),
                source: item.skill.source().to_string(),
                commit: item.skill.commit().map(str::to_string),
                integrity,
                changed,
            });
        }

        if !pass.frozen {
            if let Some(previous) = &lock {
                for name in previous.skills.keys() {
                    if next.get(name).is_none() && !pass.keep.contains(name) {
                        remove_if_exists(&self.layout.skill_dir(name)?)?;
                        info!(skill = %name, "pruned undeclared skill");
                        report.pruned.push(name.clone());
                    }
                }
            }
            next.save(&self.layout.lock_path)?;
        }

        let (targets, mut issues) = self.targets(manifest);
        for target in &targets {
            let dir = self.layout.targets_base.join(target.dir);
            match ensure_skills_symlink(&self.layout.store_dir, &dir) {
                Ok(outcome) => report.symlinks.push((target.name.to_string(), outcome)),
                Err(e) => {
                    warn!(agent = target.name, error = %e, "cannot link skills directory");
                    issues.push(SyncIssue {
                        kind: IssueKind::Symlink,
                        name: target.name.to_string(),
                        detail: e.to_string(),
                        repaired: false,
                    });
                }
            }
        }
        issues.extend(reconcile_agent_configs(
            &self.layout.targets_base,
            &targets,
            manifest,
        ));
        report.issues = issues;

        Ok(report)
    }

    fn check_trust(&self, deps: &[Dependency]) -> Result<()> {
        for dep in deps {
            let spec = SourceSpecifier::parse(dep.source())?;
            if !self.trust.is_trusted(&spec) {
                return Err(SkilletError::Untrusted(dep.source().to_string()));
            }
        }
        Ok(())
    }

    /// Every expected skill must be locked, and both the freshly resolved
    /// content and any existing store copy must hash to the locked value.
    fn verify_frozen(&self, expanded: &[ExpandedSkill], lock: &Lockfile) -> Result<()> {
        for item in expanded {
            let name = item.skill.name();
            let entry = lock.get(name).ok_or_else(|| {
                SkilletError::FrozenLockfile(format!("'{name}' is not in the lockfile"))
            })?;

            let fresh = hash_directory(item.skill.dir())?;
            if fresh != entry.integrity() {
                return Err(SkilletError::IntegrityMismatch {
                    name: name.to_string(),
                    expected: entry.integrity().to_string(),
                    actual: fresh,
                });
            }

            let dest = self.layout.store_path(name);
            if dest.is_dir() {
                let stored = hash_directory(&dest)?;
                if stored != entry.integrity() {
                    return Err(SkilletError::IntegrityMismatch {
                        name: name.to_string(),
                        expected: entry.integrity().to_string(),
                        actual: stored,
                    });
                }
            }
        }
        Ok(())
    }
}
