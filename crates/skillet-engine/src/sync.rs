use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use skillet_core::{
    Dependency, Manifest, ManifestDependency, Result, SKILL_FILE, is_safe_skill_name,
};
use skillet_lock::{Lockfile, hash_directory};

use crate::expand::PinPolicy;
use crate::installer::{InstallReport, Installer, Pass};
use crate::symlink::verify_symlinks;

/// Category of a problem found by `sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    /// Expected in the store but absent.
    Missing,
    /// Store copy no longer matches the locked integrity.
    Modified,
    Symlink,
    Mcp,
    Hooks,
    /// A best-effort step failed.
    Error,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::Missing => "missing",
            IssueKind::Modified => "modified",
            IssueKind::Symlink => "symlink",
            IssueKind::Mcp => "mcp",
            IssueKind::Hooks => "hooks",
            IssueKind::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncIssue {
    pub kind: IssueKind,
    /// Skill or agent target the issue is about.
    pub name: String,
    pub detail: String,
    /// Whether this run fixed it.
    pub repaired: bool,
}

impl SyncIssue {
    pub fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Error,
            name: name.into(),
            detail: detail.into(),
            repaired: false,
        }
    }
}

/// Outcome of [`Installer::sync`].
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Store directories adopted into the manifest as local dependencies.
    pub adopted: Vec<String>,
    pub issues: Vec<SyncIssue>,
    pub install: InstallReport,
}

impl SyncReport {
    pub fn unrepaired(&self) -> impl Iterator<Item = &SyncIssue> {
        self.issues.iter().filter(|i| !i.repaired)
    }
}

impl Installer {
    /// Detect and repair drift between manifest, lockfile, store and agent
    /// directories.
    ///
    /// Undeclared, unlocked skills found in the store are adopted as local
    /// dependencies. Missing skills are reinstalled. Store copies edited by
    /// hand are reported as `modified` and left alone.
    pub async fn sync(&self) -> Result<SyncReport> {
        let layout = self.layout();
        let mut report = SyncReport::default();

        let lock = Lockfile::load(&layout.lock_path)?;
        let manifest = Manifest::load_or_default(&layout.manifest_path)?;

        self.adopt_orphans(&manifest, lock.as_ref(), &mut report);
        let manifest = Manifest::load_or_default(&layout.manifest_path)?;

        // Drift, before anything is repaired.
        let mut expected: Vec<String> = manifest
            .declared_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        // Locked names count only while a wildcard still provides them;
        // anything else is about to be pruned.
        let wildcards: Vec<_> = manifest
            .dependencies()?
            .into_iter()
            .filter_map(|d| match d {
                Dependency::Wildcard(w) => Some(w),
                Dependency::Regular(_) => None,
            })
            .collect();
        if let Some(lock) = &lock {
            for (name, entry) in &lock.skills {
                let provided = wildcards
                    .iter()
                    .any(|w| w.source == entry.source() && !w.exclude.contains(name));
                if provided && !expected.contains(name) {
                    expected.push(name.clone());
                }
            }
        }

        let mut modified = HashSet::new();
        for name in &expected {
            let dir = layout.store_path(name);
            if !dir.is_dir() {
                report.issues.push(SyncIssue {
                    kind: IssueKind::Missing,
                    name: name.clone(),
                    detail: format!("{} does not exist", dir.display()),
                    repaired: false,
                });
                continue;
            }
            let Some(entry) = lock.as_ref().and_then(|l| l.get(name)) else {
                continue;
            };
            match hash_directory(&dir) {
                Ok(actual) if actual == entry.integrity() => {}
                Ok(actual) => {
                    warn!(skill = %name, expected = %entry.integrity(), %actual, "store copy modified");
                    modified.insert(name.clone());
                    report.issues.push(SyncIssue {
                        kind: IssueKind::Modified,
                        name: name.clone(),
                        detail: format!(
                            "content hash {actual} does not match locked {}",
                            entry.integrity()
                        ),
                        repaired: false,
                    });
                }
                Err(e) => report.issues.push(SyncIssue::error(name.clone(), e.to_string())),
            }
        }

        let (targets, _) = self.targets(&manifest);
        let target_dirs: Vec<(String, PathBuf)> = targets
            .iter()
            .map(|t| (t.name.to_string(), layout.targets_base.join(t.dir)))
            .collect();
        report
            .issues
            .extend(verify_symlinks(&layout.store_dir, &target_dirs));

        let install = self
            .reconcile(
                &manifest,
                lock,
                Pass {
                    resolver: self.resolver(),
                    pins: PinPolicy::UseLock,
                    frozen: false,
                    keep: &modified,
                },
            )
            .await?;

        for issue in report.issues.iter_mut() {
            issue.repaired = match issue.kind {
                IssueKind::Missing => layout.store_path(&issue.name).is_dir(),
                IssueKind::Symlink => !install.issues.iter().any(|i| {
                    i.kind == IssueKind::Symlink && i.name == issue.name
                }),
                _ => issue.repaired,
            };
        }
        // Symlink failures are already reported above.
        report.issues.extend(
            install
                .issues
                .iter()
                .filter(|i| i.kind != IssueKind::Symlink)
                .cloned(),
        );
        report.install = install;

        info!(
            adopted = report.adopted.len(),
            issues = report.issues.len(),
            unrepaired = report.unrepaired().count(),
            "sync finished"
        );
        Ok(report)
    }

    /// Adopt store directories that hold a skill but appear in neither the
    /// manifest nor the lockfile. Failures become `error` issues.
    fn adopt_orphans(&self, manifest: &Manifest, lock: Option<&Lockfile>, report: &mut SyncReport) {
        let layout = self.layout();
        let Ok(entries) = std::fs::read_dir(&layout.store_dir) else {
            return;
        };
        let declared = manifest.declared_names();
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();

        for name in names {
            if declared.contains(&name.as_str())
                || lock.is_some_and(|l| l.get(&name).is_some())
                || !layout.store_path(&name).join(SKILL_FILE).is_file()
            {
                continue;
            }
            if !is_safe_skill_name(&name) {
                report.issues.push(SyncIssue::error(
                    name.clone(),
                    "store directory name is not a valid skill name",
                ));
                continue;
            }
            let dep = ManifestDependency::local(&name, &layout.store_source(&name));
            match Manifest::append_dependency(&layout.manifest_path, &dep) {
                Ok(()) => {
                    info!(skill = %name, source = %dep.source, "adopted orphaned skill");
                    report.adopted.push(name);
                }
                Err(e) => {
                    warn!(skill = %name, error = %e, "cannot adopt orphaned skill");
                    report.issues.push(SyncIssue::error(name, e.to_string()));
                }
            }
        }
    }
}
