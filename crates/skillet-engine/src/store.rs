use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use skillet_core::{Result, SkilletError};

/// Replace `dest` with a copy of `src`.
///
/// The copy is built in a hidden sibling directory and renamed into place.
/// `.git` entries and symlinks are not copied. Copying a directory onto
/// itself is a no-op and returns `false`.
pub fn install_copy(src: &Path, dest: &Path) -> Result<bool> {
    let same = match (src.canonicalize(), dest.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        debug!(path = ?dest, "skill already in place");
        return Ok(false);
    }

    let parent = dest.parent().ok_or_else(|| {
        SkilletError::Io(std::io::Error::other(format!(
            "{} has no parent directory",
            dest.display()
        )))
    })?;
    std::fs::create_dir_all(parent)?;
    if let (Ok(from), Ok(into)) = (src.canonicalize(), parent.canonicalize()) {
        if into.starts_with(&from) {
            return Err(SkilletError::Io(std::io::Error::other(format!(
                "cannot copy {} into its own subdirectory",
                src.display()
            ))));
        }
    }

    let staging = tempfile::Builder::new()
        .prefix(".skillet-copy-")
        .tempdir_in(parent)?;
    let work = staging.path().join("skill");
    copy_tree(src, &work)?;

    remove_if_exists(dest)?;
    std::fs::rename(&work, dest)?;
    debug!(from = ?src, to = ?dest, "copied skill into store");
    Ok(true)
}

/// Recursive copy of regular files and directories.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let walker = WalkDir::new(src)
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
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| SkilletError::Io(std::io::Error::other(e)))?;
        let target = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
        } else {
            debug!(path = ?entry.path(), "not copying non-regular file");
        }
    }
    Ok(())
}

/// Remove a file, symlink or directory tree; absent is fine.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
