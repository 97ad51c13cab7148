#[cfg(test)]
mod tests {
    use skillet_core::SkilletError;
    use skillet_lock::{GitLockEntry, LocalLockEntry, LockEntry, Lockfile};

    fn git_entry() -> LockEntry {
        LockEntry::Git(GitLockEntry {
            source: "anthropics/skills".into(),
            integrity: "sha256-abc".into(),
            resolved_url: "https://github.com/anthropics/skills.git".into(),
            resolved_path: "skills/pdf".into(),
            resolved_ref: Some("main".into()),
            commit: "0123456789abcdef0123456789abcdef01234567".into(),
        })
    }

    fn local_entry() -> LockEntry {
        LockEntry::Local(LocalLockEntry {
            source: "./vendor/review".into(),
            integrity: "sha256-def".into(),
        })
    }

    #[test]
    fn missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Lockfile::load(&tmp.path().join("skills.lock")).unwrap().is_none());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("skills.lock");
        let mut lock = Lockfile::new();
        lock.insert("pdf", git_entry());
        lock.insert("review", local_entry());
        lock.save(&path).unwrap();

        let loaded = Lockfile::load(&path).unwrap().unwrap();
        assert_eq!(loaded, lock);
        assert_eq!(loaded.get("pdf").unwrap().kind(), "git");
        assert_eq!(
            loaded.get("pdf").unwrap().commit(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
        assert_eq!(loaded.get("review").unwrap().commit(), None);
    }

    #[test]
    fn entries_are_tagged_and_sorted() {
        let mut lock = Lockfile::new();
        lock.insert("zeta", local_entry());
        lock.insert("alpha", git_entry());
        let text = lock.to_toml().unwrap();

        assert!(text.contains("version = 1"));
        assert!(text.contains("type = \"git\""));
        assert!(text.contains("type = \"local\""));
        let alpha = text.find("[skills.alpha]").unwrap();
        let zeta = text.find("[skills.zeta]").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn parse_hand_written() {
        let lock = Lockfile::from_toml(
            r#"
version = 1

[skills.pdf]
type = "git"
source = "git:file:///srv/skills"
integrity = "sha256-xyz"
resolved_url = "file:///srv/skills"
resolved_path = "pdf"
commit = "0123456789abcdef0123456789abcdef01234567"
"#,
        )
        .unwrap();
        match lock.get("pdf").unwrap() {
            LockEntry::Git(e) => {
                assert_eq!(e.resolved_path, "pdf");
                assert!(e.resolved_ref.is_none());
            }
            other => panic!("expected git entry, got {other:?}"),
        }
    }

    #[test]
    fn unknown_version_rejected() {
        let err = Lockfile::from_toml("version = 2\n").unwrap_err();
        assert!(matches!(err, SkilletError::Lockfile(msg) if msg.contains("version 2")));
    }

    #[test]
    fn malformed_is_lockfile_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("skills.lock");
        std::fs::write(&path, "version = 1\n[skills.pdf]\ntype = \"svn\"\n").unwrap();
        let err = Lockfile::load(&path).unwrap_err();
        assert!(matches!(err, SkilletError::Lockfile(msg) if msg.contains("skills.lock")));
    }

    #[test]
    fn path_like_keys_rejected() {
        for key in ["../../victim", "a/b", ".hidden"] {
            let content = format!(
                "version = 1\n[skills.\"{key}\"]\ntype = \"local\"\nsource = \"./x\"\nintegrity = \"sha256-abc\"\n"
            );
            let err = Lockfile::from_toml(&content).unwrap_err();
            assert!(
                matches!(&err, SkilletError::Lockfile(msg) if msg.contains(key)),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn retain_and_commit_lookup() {
        let mut lock = Lockfile::new();
        lock.insert("pdf", git_entry());
        lock.insert("review", local_entry());

        assert_eq!(
            lock.get("pdf").and_then(LockEntry::commit),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
        assert_eq!(lock.get("review").and_then(LockEntry::commit), None);

        let dropped = lock.retain(|name| name == "pdf");
        assert_eq!(dropped, vec!["review".to_string()]);
        assert!(lock.get("review").is_none());
    }

    #[test]
    fn save_replaces_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("skills.lock");
        std::fs::write(&path, "garbage").unwrap();
        Lockfile::new().save(&path).unwrap();
        assert!(Lockfile::load(&path).unwrap().unwrap().skills.is_empty());
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
