use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use skillet_core::{Result, SkilletError};

use crate::sync::{IssueKind, SyncIssue};

/// Name of the entry inside each agent directory that points at the store.
pub const SKILLS_LINK: &str = "skills";

/// What [`ensure_skills_symlink`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymlinkOutcome {
    Created,
    Unchanged,
    /// A symlink pointing elsewhere was replaced.
    Replaced,
    /// A real directory was emptied into the store and replaced by the link.
    Migrated { moved: usize },
    /// Like `Migrated`, but some entries collided with store contents or
    /// could not be moved; the leftover directory was renamed to
    /// `preserved_at`.
    Preserved { moved: usize, preserved_at: PathBuf },
}

/// Make `target_dir/skills` a relative symlink to `store_dir`.
///
/// A real directory in the way has each entry not already in the store moved
/// there by rename; nothing is ever deleted or copied. A regular file in the way is an error.
pub fn ensure_skills_symlink(store_dir: &Path, target_dir: &Path) -> Result<SymlinkOutcome> {
    let link = target_dir.join(SKILLS_LINK);
    let wanted = relative_path(target_dir, store_dir);
    std::fs::create_dir_all(store_dir)?;
    std::fs::create_dir_all(target_dir)?;

    let meta = match std::fs::symlink_metadata(&link) {
        Ok(m) => Some(m),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let Some(meta) = meta else {
        make_symlink(&wanted, &link)?;
        info!(link = ?link, to = ?wanted, "created skills symlink");
        return Ok(SymlinkOutcome::Created);
    };

    if meta.file_type().is_symlink() {
        if points_at(&link, store_dir) {
            return Ok(SymlinkOutcome::Unchanged);
        }
        remove_symlink(&link)?;
        make_symlink(&wanted, &link)?;
        info!(link = ?link, to = ?wanted, "replaced skills symlink");
        return Ok(SymlinkOutcome::Replaced);
    }

    if meta.is_dir() {
        return migrate_directory(&link, store_dir, &wanted);
    }

    Err(SkilletError::Symlink {
        path: link.display().to_string(),
        reason: "a regular file is in the way; move it and run sync again".into(),
    })
}

fn migrate_directory(link: &Path, store_dir: &Path, wanted: &Path) -> Result<SymlinkOutcome> {
    migrate_with(link, store_dir, wanted, |from, to| std::fs::rename(from, to))
}

/// Entries `move_entry` refuses (a rename across filesystems, say) stay in
/// the old directory along with collisions.
fn migrate_with(
    link: &Path,
    store_dir: &Path,
    wanted: &Path,
    move_entry: impl Fn(&Path, &Path) -> std::io::Result<()>,
) -> Result<SymlinkOutcome> {
    let mut moved = 0;
    let mut kept = 0;

    let mut entries: Vec<_> = std::fs::read_dir(link)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let dest = store_dir.join(entry.file_name());
        if std::fs::symlink_metadata(&dest).is_ok() {
            warn!(entry = ?entry.path(), "already in the store, leaving in place");
            kept += 1;
            continue;
        }
        match move_entry(&entry.path(), &dest) {
            Ok(()) => {
                debug!(from = ?entry.path(), to = ?dest, "migrated into store");
                moved += 1;
            }
            Err(e) => {
                warn!(entry = ?entry.path(), error = %e, "cannot move into the store, leaving in place");
                kept += 1;
            }
        }
    }

    let outcome = if kept == 0 {
        std::fs::remove_dir(link)?;
        SymlinkOutcome::Migrated { moved }
    } else {
        let preserved_at = free_sibling(link, "skills.orig");
        std::fs::rename(link, &preserved_at)?;
        warn!(path = ?preserved_at, kept, "kept entries from the old skills directory");
        SymlinkOutcome::Preserved {
            moved,
            preserved_at,
        }
    };

    make_symlink(wanted, link)?;
    info!(link = ?link, moved, "migrated skills directory to symlink");
    Ok(outcome)
}

/// `<dir>/<base>`, or `<base>-2`, `<base>-3`... if taken.
fn free_sibling(path: &Path, base: &str) -> PathBuf {
    let dir = path.parent().unwrap_or(Path::new("."));
    let first = dir.join(base);
    if std::fs::symlink_metadata(&first).is_err() {
        return first;
    }
    (2..)
        .map(|n| dir.join(format!("{base}-{n}")))
        .find(|p| std::fs::symlink_metadata(p).is_err())
        .unwrap_or(first)
}

/// Describe what is wrong with `target_dir/skills`, if anything.
pub fn check_skills_symlink(store_dir: &Path, target_dir: &Path) -> Option<String> {
    let link = target_dir.join(SKILLS_LINK);
    match std::fs::symlink_metadata(&link) {
        Err(_) => Some(format!("{} is missing", link.display())),
        Ok(m) if !m.file_type().is_symlink() => {
            Some(format!("{} is not a symlink", link.display()))
        }
        Ok(_) if !points_at(&link, store_dir) => Some(format!(
            "{} points at {} instead of the store",
            link.display(),
            std::fs::read_link(&link)
                .map(|t| t.display().to_string())
                .unwrap_or_default()
        )),
        Ok(_) => None,
    }
}

/// Read-only check of every target; one `symlink` issue per broken one.
pub fn verify_symlinks(store_dir: &Path, targets: &[(String, PathBuf)]) -> Vec<SyncIssue> {
    targets
        .iter()
        .filter_map(|(name, dir)| {
            check_skills_symlink(store_dir, dir).map(|detail| SyncIssue {
                kind: IssueKind::Symlink,
                name: name.clone(),
                detail,
                repaired: false,
            })
        })
        .collect()
}

fn points_at(link: &Path, store_dir: &Path) -> bool {
    let Ok(target) = std::fs::read_link(link) else {
        return false;
    };
    let resolved = match link.parent() {
        Some(parent) if target.is_relative() => parent.join(&target),
        _ => target,
    };
    match (resolved.canonicalize(), store_dir.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => lexical_normalize(&resolved) == lexical_normalize(store_dir),
    }
}

/// Path from directory `from` to `to`, computed lexically. Falls back to `to`
/// when the two share no root.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from = lexical_normalize(from);
    let to = lexical_normalize(to);
    let from_parts: Vec<Component> = from.components().collect();
    let to_parts: Vec<Component> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 && from.has_root() {
        return to;
    }

    let mut rel = PathBuf::new();
    for _ in common..from_parts.len() {
        rel.push("..");
    }
    for part in &to_parts[common..] {
        rel.push(part.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| SkilletError::Symlink {
        path: link.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(target, link).map_err(|e| SkilletError::Symlink {
        path: link.display().to_string(),
        reason: e.to_string(),
    })
}

fn remove_symlink(link: &Path) -> Result<()> {
    // Directory symlinks on Windows need remove_dir.
    std::fs::remove_file(link).or_else(|_| std::fs::remove_dir(link))?;
    Ok(())
}
