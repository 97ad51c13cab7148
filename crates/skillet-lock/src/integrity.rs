use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use skillet_core::{Result, SkilletError};

/// Prefix of every integrity string.
pub const INTEGRITY_PREFIX: &str = "sha256-";

/// Content hash of a directory tree.
///
/// Regular files only: symlinks and special files are skipped, as is any
/// `.git` entry. Each file is hashed on its own, the `(relative path, digest)`
/// pairs are sorted by `/`-separated path and hashed again, so the result does
/// not depend on walk order or platform path separators.
pub fn hash_directory(dir: &Path) -> Result<String> {
    if !dir.is_dir() {
        return Err(SkilletError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        )));
    }

    let mut files: Vec<(String, String)> = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| {
            SkilletError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| SkilletError::Io(std::io::Error::other(e)))?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((rel, hash_file(entry.path())?));
    }

    files.sort();

    let mut outer = Sha256::new();
    for (rel, digest) in &files {
        outer.update(rel.as_bytes());
        outer.update([0u8]);
        outer.update(digest.as_bytes());
        outer.update(b"\n");
    }
    let integrity = format!("{INTEGRITY_PREFIX}{}", STANDARD.encode(outer.finalize()));
    debug!(dir = ?dir, files = files.len(), %integrity, "hashed directory");
    Ok(integrity)
}

fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn skill(dir: &Path) {
        fs::create_dir_all(dir.join("scripts")).unwrap();
        fs::write(dir.join("SKILL.md"), "---\nname: pdf\ndescription: d\n---\n").unwrap();
        fs::write(dir.join("scripts/run.sh"), "echo hi\n").unwrap();
    }

    #[test]
    fn format_and_determinism() {
        let tmp = tempfile::tempdir().unwrap();
        skill(tmp.path());
        let a = hash_directory(tmp.path()).unwrap();
        let b = hash_directory(tmp.path()).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(INTEGRITY_PREFIX));
        // 32-byte digest in padded base64.
        assert_eq!(a.len(), INTEGRITY_PREFIX.len() + 44);
    }

    #[test]
    fn same_content_different_location() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        skill(one.path());
        // Create in the opposite order.
        fs::write(two.path().join("SKILL.md"), "---\nname: pdf\ndescription: d\n---\n").unwrap();
        fs::create_dir_all(two.path().join("scripts")).unwrap();
        fs::write(two.path().join("scripts/run.sh"), "echo hi\n").unwrap();
        assert_eq!(
            hash_directory(one.path()).unwrap(),
            hash_directory(two.path()).unwrap()
        );
    }

    #[test]
    fn byte_change_changes_hash() {
        let tmp = tempfile::tempdir().unwrap();
        skill(tmp.path());
        let before = hash_directory(tmp.path()).unwrap();
        fs::write(tmp.path().join("scripts/run.sh"), "echo hi!\n").unwrap();
        assert_ne!(before, hash_directory(tmp.path()).unwrap());
    }

    #[test]
    fn added_file_changes_hash() {
        let tmp = tempfile::tempdir().unwrap();
        skill(tmp.path());
        let before = hash_directory(tmp.path()).unwrap();
        fs::write(tmp.path().join("notes.md"), "").unwrap();
        assert_ne!(before, hash_directory(tmp.path()).unwrap());
    }

    #[test]
    fn rename_changes_hash() {
        let tmp = tempfile::tempdir().unwrap();
        skill(tmp.path());
        let before = hash_directory(tmp.path()).unwrap();
        fs::rename(tmp.path().join("scripts/run.sh"), tmp.path().join("scripts/go.sh")).unwrap();
        assert_ne!(before, hash_directory(tmp.path()).unwrap());
    }

    #[test]
    fn git_metadata_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        skill(tmp.path());
        let before = hash_directory(tmp.path()).unwrap();
        fs::create_dir_all(tmp.path().join(".git/objects")).unwrap();
        fs::write(tmp.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        assert_eq!(before, hash_directory(tmp.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        skill(tmp.path());
        let before = hash_directory(tmp.path()).unwrap();
        std::os::unix::fs::symlink("/etc/hostname", tmp.path().join("link")).unwrap();
        assert_eq!(before, hash_directory(tmp.path()).unwrap());
    }

    #[test]
    fn missing_directory_errors() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(hash_directory(&tmp.path().join("nope")).is_err());
    }
}
