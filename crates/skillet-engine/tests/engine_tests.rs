//! End-to-end install, update, remove and sync runs against throw-away git
//! repositories served over `file://`. Every test returns early when no `git`
//! binary is available.

#[cfg(test)]
mod tests {
    use skillet_core::SkilletError;
    use skillet_engine::{
        AllowList, InstallOptions, Installer, IssueKind, Resolver, Scope, SymlinkOutcome,
        verify_symlinks,
    };
    use skillet_lock::{LockEntry, Lockfile};
    use skillet_source::{CacheSettings, ObjectCache};
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use std::time::Duration;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let out = Command::new("git")
            .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    fn skill_md(name: &str) -> String {
        format!("---\nname: {name}\ndescription: {name} helper\n---\n\n# {name}\n")
    }

    /// A repository with one committed skill directory per name.
    fn upstream(dir: &Path, skills: &[&str]) -> String {
        std::fs::create_dir_all(dir).unwrap();
        git(dir, &["init", "--quiet", "-b", "main"]);
        git(dir, &["config", "uploadpack.allowAnySHA1InWant", "true"]);
        for name in skills {
            let skill_dir = dir.join("skills").join(name);
            std::fs::create_dir_all(&skill_dir).unwrap();
            std::fs::write(skill_dir.join("SKILL.md"), skill_md(name)).unwrap();
        }
        git(dir, &["add", "-A"]);
        git(dir, &["commit", "--quiet", "-m", "initial"]);
        git(dir, &["rev-parse", "HEAD"])
    }

    fn add_skill(repo: &Path, name: &str) -> String {
        let skill_dir = repo.join("skills").join(name);
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), skill_md(name)).unwrap();
        git(repo, &["add", "-A"]);
        git(repo, &["commit", "--quiet", "-m", name]);
        git(repo, &["rev-parse", "HEAD"])
    }

    fn source(repo: &Path) -> String {
        format!("git:file://{}", repo.display())
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        project: PathBuf,
        upstream: PathBuf,
        installer: Installer,
    }

    impl Fixture {
        fn new(skills: &[&str]) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let project = tmp.path().join("project");
            std::fs::create_dir_all(&project).unwrap();
            let upstream_dir = tmp.path().join("upstream");
            upstream(&upstream_dir, skills);

            let cache = ObjectCache::with_process_git(CacheSettings::new(
                tmp.path().join("cache"),
                Duration::from_secs(3600),
            ));
            let installer =
                Installer::new(Scope::Project(project.clone()).layout(), Resolver::new(cache));
            Self {
                _tmp: tmp,
                project,
                upstream: upstream_dir,
                installer,
            }
        }

        fn write_manifest(&self, body: &str) {
            std::fs::write(
                self.project.join("skills.toml"),
                format!("version = 1\n{body}"),
            )
            .unwrap();
        }

        fn store(&self) -> PathBuf {
            self.project.join(".agents/skills")
        }

        fn lock(&self) -> Lockfile {
            Lockfile::load(&self.project.join("skills.lock"))
                .unwrap()
                .unwrap()
        }

        fn lock_text(&self) -> String {
            std::fs::read_to_string(self.project.join("skills.lock")).unwrap()
        }
    }

    #[tokio::test]
    async fn install_from_git_locks_commit_and_integrity() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{}\"\n",
            source(&fx.upstream)
        ));

        let report = fx.installer.install(InstallOptions::default()).await.unwrap();
        assert_eq!(report.installed.len(), 1);
        assert!(report.installed[0].changed);

        assert!(fx.store().join("pdf/SKILL.md").is_file());
        assert!(!fx.store().join("review").exists());

        let lock = fx.lock();
        let LockEntry::Git(entry) = lock.get("pdf").unwrap() else {
            panic!("expected a git entry");
        };
        assert_eq!(entry.commit.len(), 40);
        assert!(entry.commit.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(entry.integrity.starts_with("sha256-"));
        assert_eq!(entry.resolved_path, "skills/pdf");
        assert!(fx.lock_text().starts_with("# Generated by skillet"));

        // Default target gets a relative link into the store.
        let link = fx.project.join(".claude/skills");
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(&link).unwrap(), PathBuf::from("../.agents/skills"));
        assert!(link.join("pdf/SKILL.md").is_file());
    }

    #[tokio::test]
    async fn second_install_changes_nothing() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{}\"\n",
            source(&fx.upstream)
        ));

        fx.installer.install(InstallOptions::default()).await.unwrap();
        let before = fx.lock_text();

        let report = fx.installer.install(InstallOptions::default()).await.unwrap();
        assert!(report.installed.iter().all(|s| !s.changed));
        assert!(report.pruned.is_empty());
        assert_eq!(report.symlinks[0].1, SymlinkOutcome::Unchanged);
        assert_eq!(fx.lock_text(), before);
    }

    #[tokio::test]
    async fn wildcard_respects_exclude() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"*\"\nsource = \"{}\"\nexclude = [\"review\"]\n",
            source(&fx.upstream)
        ));

        fx.installer.install(InstallOptions::default()).await.unwrap();
        let lock = fx.lock();
        assert_eq!(lock.skills.keys().collect::<Vec<_>>(), vec!["pdf"]);
        assert!(fx.store().join("pdf").is_dir());
        assert!(!fx.store().join("review").exists());
    }

    #[tokio::test]
    async fn frozen_install_rejects_edited_store_copy() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{}\"\n",
            source(&fx.upstream)
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();
        let before = fx.lock_text();

        std::fs::write(fx.store().join("pdf/SKILL.md"), "tampered").unwrap();
        let err = fx
            .installer
            .install(InstallOptions {
                frozen: true,
                force: false,
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, SkilletError::IntegrityMismatch { ref name, .. } if name == "pdf"),
            "{err}"
        );
        assert_eq!(fx.lock_text(), before);
        assert_eq!(
            std::fs::read_to_string(fx.store().join("pdf/SKILL.md")).unwrap(),
            "tampered"
        );
    }

    #[tokio::test]
    async fn frozen_without_lockfile_fails() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{}\"\n",
            source(&fx.upstream)
        ));
        let err = fx
            .installer
            .install(InstallOptions {
                frozen: true,
                force: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SkilletError::FrozenLockfile(_)));

        let err = fx
            .installer
            .install(InstallOptions {
                frozen: true,
                force: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SkilletError::Config(_)));
    }

    #[tokio::test]
    async fn pinned_wildcard_ignores_new_upstream_skills_until_update() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"*\"\nsource = \"{}\"\n",
            source(&fx.upstream)
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();
        let first = fx.lock().get("pdf").unwrap().commit().unwrap().to_string();

        let second = add_skill(&fx.upstream, "review");
        fx.installer.install(InstallOptions::default()).await.unwrap();
        let lock = fx.lock();
        assert!(lock.get("review").is_none());
        assert_eq!(lock.get("pdf").unwrap().commit(), Some(first.as_str()));

        fx.installer.update(&[]).await.unwrap();
        let lock = fx.lock();
        assert_eq!(lock.get("review").unwrap().commit(), Some(second.as_str()));
        assert_eq!(lock.get("pdf").unwrap().commit(), Some(second.as_str()));
        assert!(fx.store().join("review/SKILL.md").is_file());
    }

    #[tokio::test]
    async fn named_dependency_beats_wildcard() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        let other = fx.project.parent().unwrap().join("other");
        upstream(&other, &["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"*\"\nsource = \"{}\"\n\n[[skills]]\nname = \"pdf\"\nsource = \"{}\"\n",
            source(&fx.upstream),
            source(&other)
        ));

        fx.installer.install(InstallOptions::default()).await.unwrap();
        let lock = fx.lock();
        assert_eq!(lock.get("pdf").unwrap().source(), source(&other));
        assert_eq!(lock.get("review").unwrap().source(), source(&fx.upstream));
    }

    #[tokio::test]
    async fn overlapping_wildcards_conflict() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        let other = fx.project.parent().unwrap().join("other");
        upstream(&other, &["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"*\"\nsource = \"{}\"\n\n[[skills]]\nname = \"*\"\nsource = \"{}\"\n",
            source(&fx.upstream),
            source(&other)
        ));

        let err = fx.installer.install(InstallOptions::default()).await.unwrap_err();
        assert!(
            matches!(err, SkilletError::WildcardConflict { ref name, .. } if name == "pdf"),
            "{err}"
        );
        assert!(!fx.project.join("skills.lock").exists());
    }

    #[tokio::test]
    async fn remove_drops_manifest_lock_and_store() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        let src = source(&fx.upstream);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{src}\"\n\n[[skills]]\nname = \"review\"\nsource = \"{src}\"\n"
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();

        fx.installer.remove("review").unwrap();
        let manifest = std::fs::read_to_string(fx.project.join("skills.toml")).unwrap();
        assert!(!manifest.contains("review"));
        assert!(manifest.contains("pdf"));
        assert!(fx.lock().get("review").is_none());
        assert!(!fx.store().join("review").exists());
        assert!(fx.store().join("pdf").is_dir());

        let err = fx.installer.remove("review").unwrap_err();
        assert!(matches!(err, SkilletError::Resolve { .. }));
    }

    #[tokio::test]
    async fn remove_refuses_wildcard_skill() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"*\"\nsource = \"{}\"\n",
            source(&fx.upstream)
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();

        let err = fx.installer.remove("pdf").unwrap_err();
        assert!(err.to_string().contains("exclude"), "{err}");
        assert!(fx.store().join("pdf").is_dir());
    }

    #[tokio::test]
    async fn dropping_a_dependency_prunes_it() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        let src = source(&fx.upstream);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{src}\"\n\n[[skills]]\nname = \"review\"\nsource = \"{src}\"\n"
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();

        fx.write_manifest(&format!("\n[[skills]]\nname = \"pdf\"\nsource = \"{src}\"\n"));
        let report = fx.installer.install(InstallOptions::default()).await.unwrap();
        assert_eq!(report.pruned, vec!["review".to_string()]);
        assert!(!fx.store().join("review").exists());
        assert!(fx.lock().get("review").is_none());
    }

    #[tokio::test]
    async fn list_reports_declared_and_locked() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"*\"\nsource = \"{src}\"\n\n[[skills]]\nname = \"pdf\"\nsource = \"{src}\"\n",
            src = source(&fx.upstream)
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();

        let entries = fx.installer.list().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["pdf", "review"]);
        assert!(entries[0].declared);
        assert!(!entries[1].declared);
        assert!(entries.iter().all(|e| e.installed && e.locked.is_some()));
    }

    #[tokio::test]
    async fn untrusted_source_is_refused() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{}\"\n",
            source(&fx.upstream)
        ));
        let Fixture {
            _tmp,
            project,
            installer,
            ..
        } = fx;
        let installer = installer.with_trust(AllowList::new(["anthropics"]));

        let err = installer.install(InstallOptions::default()).await.unwrap_err();
        assert!(matches!(err, SkilletError::Untrusted(_)));
        assert!(!project.join(".agents/skills/pdf").exists());
    }

    #[tokio::test]
    async fn existing_skills_directory_is_migrated() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{}\"\n",
            source(&fx.upstream)
        ));
        let old = fx.project.join(".claude/skills");
        std::fs::create_dir_all(old.join("pdf")).unwrap();
        std::fs::write(old.join("pdf/SKILL.md"), "mine").unwrap();
        std::fs::create_dir_all(old.join("notes")).unwrap();
        std::fs::write(old.join("notes/SKILL.md"), skill_md("notes")).unwrap();

        let report = fx.installer.install(InstallOptions::default()).await.unwrap();
        let preserved = fx.project.join(".claude/skills.orig");
        assert_eq!(
            report.symlinks[0].1,
            SymlinkOutcome::Preserved {
                moved: 1,
                preserved_at: preserved.clone(),
            }
        );
        assert!(fx.store().join("notes/SKILL.md").is_file());
        assert_eq!(
            std::fs::read_to_string(preserved.join("pdf/SKILL.md")).unwrap(),
            "mine"
        );
        assert!(std::fs::symlink_metadata(&old).unwrap().file_type().is_symlink());
    }

    #[tokio::test]
    async fn sync_adopts_orphaned_store_directory() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest("");
        let orphan = fx.store().join("orphan");
        std::fs::create_dir_all(&orphan).unwrap();
        std::fs::write(orphan.join("SKILL.md"), skill_md("orphan")).unwrap();

        let report = fx.installer.sync().await.unwrap();
        assert_eq!(report.adopted, vec!["orphan".to_string()]);
        assert!(
            !report
                .issues
                .iter()
                .any(|i| matches!(i.kind, IssueKind::Missing | IssueKind::Error)),
            "{:?}",
            report.issues
        );
        assert_eq!(report.unrepaired().count(), 0);

        let manifest = std::fs::read_to_string(fx.project.join("skills.toml")).unwrap();
        assert!(manifest.contains("./.agents/skills/orphan"));
        let lock = fx.lock();
        assert_eq!(lock.get("orphan").unwrap().kind(), "local");
        assert!(orphan.join("SKILL.md").is_file());
    }

    #[tokio::test]
    async fn sync_reinstalls_missing_and_reports_modified() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        let src = source(&fx.upstream);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{src}\"\n\n[[skills]]\nname = \"review\"\nsource = \"{src}\"\n"
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();
        let locked_review = fx.lock().get("review").unwrap().clone();

        std::fs::remove_dir_all(fx.store().join("pdf")).unwrap();
        std::fs::write(fx.store().join("review/SKILL.md"), "edited").unwrap();
        std::fs::remove_file(fx.project.join(".claude/skills")).unwrap();

        let report = fx.installer.sync().await.unwrap();
        let kind_of = |kind: IssueKind| report.issues.iter().find(|i| i.kind == kind).unwrap();

        let missing = kind_of(IssueKind::Missing);
        assert_eq!(missing.name, "pdf");
        assert!(missing.repaired);
        assert!(fx.store().join("pdf/SKILL.md").is_file());

        let modified = kind_of(IssueKind::Modified);
        assert_eq!(modified.name, "review");
        assert!(!modified.repaired);
        assert_eq!(
            std::fs::read_to_string(fx.store().join("review/SKILL.md")).unwrap(),
            "edited"
        );
        assert_eq!(fx.lock().get("review"), Some(&locked_review));

        assert!(kind_of(IssueKind::Symlink).repaired);
        assert!(fx.project.join(".claude/skills").exists());
    }

    #[tokio::test]
    async fn update_named_skill_leaves_others_pinned() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        let src = source(&fx.upstream);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{src}\"\n\n[[skills]]\nname = \"review\"\nsource = \"{src}\"\n"
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();
        let first = fx.lock().get("pdf").unwrap().commit().unwrap().to_string();

        let second = add_skill(&fx.upstream, "zzz");
        let report = fx.installer.update(&["review".to_string()]).await.unwrap();
        assert!(report.pruned.is_empty());

        let lock = fx.lock();
        assert_eq!(lock.get("review").unwrap().commit(), Some(second.as_str()));
        assert_eq!(lock.get("pdf").unwrap().commit(), Some(first.as_str()));
        assert!(lock.get("zzz").is_none());

        let err = fx.installer.update(&["nope".to_string()]).await.unwrap_err();
        assert!(matches!(err, SkilletError::Resolve { .. }), "{err}");
    }

    #[tokio::test]
    async fn install_after_wildcard_update_keeps_new_commit() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{src}\"\n\n[[skills]]\nname = \"*\"\nsource = \"{src}\"\n",
            src = source(&fx.upstream)
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();
        let first = fx.lock().get("pdf").unwrap().commit().unwrap().to_string();

        let second = add_skill(&fx.upstream, "zzz");
        fx.installer.update(&["review".to_string()]).await.unwrap();
        let lock = fx.lock();
        assert_eq!(lock.get("review").unwrap().commit(), Some(second.as_str()));
        assert_eq!(lock.get("zzz").unwrap().commit(), Some(second.as_str()));
        assert_eq!(lock.get("pdf").unwrap().commit(), Some(first.as_str()));
        let updated = fx.lock_text();

        // The older commit on the named `pdf` entry must not drag the
        // wildcard back.
        let report = fx.installer.install(InstallOptions::default()).await.unwrap();
        assert!(report.pruned.is_empty(), "{:?}", report.pruned);
        assert_eq!(fx.lock_text(), updated);
        assert!(fx.store().join("zzz/SKILL.md").is_file());
    }

    #[tokio::test]
    async fn lockfile_key_outside_store_is_rejected() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest("");
        std::fs::create_dir_all(fx.store()).unwrap();
        let victim = fx.project.join("victim");
        std::fs::create_dir_all(&victim).unwrap();
        std::fs::write(victim.join("precious.txt"), "keep").unwrap();
        std::fs::write(
            fx.project.join("skills.lock"),
            "version = 1\n\n[skills.\"../../victim\"]\ntype = \"local\"\nsource = \"./victim\"\nintegrity = \"sha256-abc\"\n",
        )
        .unwrap();

        let err = fx.installer.install(InstallOptions::default()).await.unwrap_err();
        assert!(matches!(err, SkilletError::Lockfile(_)), "{err}");
        assert!(fx.installer.sync().await.is_err());
        assert_eq!(
            std::fs::read_to_string(victim.join("precious.txt")).unwrap(),
            "keep"
        );

        std::fs::remove_file(fx.project.join("skills.lock")).unwrap();
        let err = fx.installer.remove("../victim").unwrap_err();
        assert!(matches!(err, SkilletError::PathEscape { .. }), "{err}");
        let err = fx.installer.update(&["../victim".to_string()]).await.unwrap_err();
        assert!(matches!(err, SkilletError::PathEscape { .. }), "{err}");
        assert!(victim.join("precious.txt").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wrong_symlink_is_reported_then_replaced() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf"]);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{}\"\n",
            source(&fx.upstream)
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();

        let agent = fx.project.join(".claude");
        let link = agent.join("skills");
        std::fs::create_dir_all(fx.project.join("elsewhere")).unwrap();
        std::fs::remove_file(&link).unwrap();
        std::os::unix::fs::symlink("../elsewhere", &link).unwrap();

        let issues = verify_symlinks(&fx.store(), &[("claude".to_string(), agent.clone())]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Symlink);
        assert!(issues[0].detail.contains("elsewhere"), "{}", issues[0].detail);
        assert!(!issues[0].repaired);

        let report = fx.installer.install(InstallOptions::default()).await.unwrap();
        assert_eq!(report.symlinks[0].1, SymlinkOutcome::Replaced);
        assert_eq!(std::fs::read_link(&link).unwrap(), PathBuf::from("../.agents/skills"));
        assert!(verify_symlinks(&fx.store(), &[("claude".to_string(), agent)]).is_empty());
        assert!(fx.project.join("elsewhere").is_dir());
    }

    #[tokio::test]
    async fn sync_after_dropping_a_dependency_is_clean() {
        if !git_available() {
            return;
        }
        let fx = Fixture::new(&["pdf", "review"]);
        let src = source(&fx.upstream);
        fx.write_manifest(&format!(
            "\n[[skills]]\nname = \"pdf\"\nsource = \"{src}\"\n\n[[skills]]\nname = \"review\"\nsource = \"{src}\"\n"
        ));
        fx.installer.install(InstallOptions::default()).await.unwrap();

        fx.write_manifest(&format!("\n[[skills]]\nname = \"pdf\"\nsource = \"{src}\"\n"));
        std::fs::remove_dir_all(fx.store().join("review")).unwrap();

        let report = fx.installer.sync().await.unwrap();
        assert!(
            !report.issues.iter().any(|i| i.kind == IssueKind::Missing),
            "{:?}",
            report.issues
        );
        assert_eq!(report.unrepaired().count(), 0);
        assert_eq!(report.install.pruned, vec!["review".to_string()]);
        assert!(fx.lock().get("review").is_none());
    }
}
