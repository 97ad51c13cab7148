use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use skillet_core::{Result, SkilletError};

use crate::git::{GitClient, ProcessGit};
use crate::specifier::looks_like_commit;

/// Written inside `.git/` after every successful clone or fetch; its mtime is
/// the last-fetch time of an unpinned checkout.
const FETCH_MARKER: &str = "skillet-fetched";

/// Where checkouts live and how long an unpinned checkout stays fresh.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub ttl: Duration,
}

impl CacheSettings {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }
}

/// A checkout ready to read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCheckout {
    pub dir: PathBuf,
    /// Full hash of the checked-out commit.
    pub commit: String,
}

/// On-disk cache of git checkouts.
///
/// Pinned entries (`<key>@<commit>`) are immutable once present and are
/// returned without touching git. Unpinned entries (`<key>`, or
/// `<key>#<ref>` when a ref is requested) are refreshed when their fetch
/// marker is older than the TTL, at most once per cache instance.
pub struct ObjectCache {
    settings: CacheSettings,
    git: Arc<dyn GitClient>,
    refreshed: Mutex<HashSet<PathBuf>>,
}

impl ObjectCache {
    pub fn new(settings: CacheSettings, git: Arc<dyn GitClient>) -> Self {
        Self {
            settings,
            git,
            refreshed: Mutex::new(HashSet::new()),
        }
    }

    /// Cache that shells out to the `git` on `PATH`.
    pub fn with_process_git(settings: CacheSettings) -> Self {
        Self::new(settings, Arc::new(ProcessGit::new()))
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Same directory and git client, but every unpinned entry counts as
    /// stale. Used by `update`.
    pub fn fresh(&self) -> Self {
        Self::new(
            CacheSettings {
                dir: self.settings.dir.clone(),
                ttl: Duration::ZERO,
            },
            Arc::clone(&self.git),
        )
    }

    /// Directory an entry lives in.
    pub fn entry_dir(&self, cache_key: &str, git_ref: Option<&str>, pinned: Option<&str>) -> PathBuf {
        let name = match (pinned, git_ref) {
            (Some(commit), _) => format!("{cache_key}@{commit}"),
            (None, Some(r)) => format!("{cache_key}#{}", sanitize_ref(r)),
            (None, None) => cache_key.to_string(),
        };
        self.settings.dir.join(name)
    }

    /// Make sure a checkout of `url` exists and return it.
    ///
    /// With `pinned_commit` the checkout is at exactly that commit. Without it
    /// the checkout tracks `git_ref` (remote default branch when `None`).
    pub async fn ensure_cached(
        &self,
        url: &str,
        cache_key: &str,
        git_ref: Option<&str>,
        pinned_commit: Option<&str>,
    ) -> Result<CachedCheckout> {
        match pinned_commit {
            Some(commit) => self.ensure_pinned(url, cache_key, git_ref, commit).await,
            None => self.ensure_unpinned(url, cache_key, git_ref).await,
        }
    }

    async fn ensure_pinned(
        &self,
        url: &str,
        cache_key: &str,
        git_ref: Option<&str>,
        commit: &str,
    ) -> Result<CachedCheckout> {
        if !looks_like_commit(commit) {
            return Err(SkilletError::Git {
                command: "checkout".into(),
                stderr: format!("'{commit}' is not a full commit hash"),
                hint: None,
            });
        }

        let dir = self.entry_dir(cache_key, git_ref, Some(commit));
        if dir.join(".git").exists() {
            debug!(key = %cache_key, %commit, "pinned checkout already cached");
            return Ok(CachedCheckout {
                dir,
                commit: commit.to_string(),
            });
        }

        info!(url = %url, %commit, "fetching pinned checkout");
        let staging = self.staging_dir(&dir)?;
        let work = staging.path().join("checkout");

        let branch = git_ref.filter(|r| !looks_like_commit(r));
        if let Err(e) = self.git.clone_repo(url, &work, branch).await {
            // The ref may have moved or vanished since the pin was recorded.
            let Some(r) = branch else { return Err(e) };
            warn!(url = %url, git_ref = %r, error = %e, "clone at ref failed, retrying default branch");
            remove_dir_if_exists(&work)?;
            self.git.clone_repo(url, &work, None).await?;
        }

        if self.git.head_commit(&work).await? != commit {
            self.git.fetch_ref(&work, commit).await?;
            self.git.checkout_commit(&work, commit).await?;
        }
        let head = self.git.head_commit(&work).await?;
        if head != commit {
            return Err(SkilletError::Git {
                command: "checkout".into(),
                stderr: format!("HEAD is {head} after checking out {commit}"),
                hint: None,
            });
        }

        touch_marker(&work)?;
        install_entry(&work, &dir)?;
        Ok(CachedCheckout {
            dir,
            commit: head,
        })
    }

    async fn ensure_unpinned(
        &self,
        url: &str,
        cache_key: &str,
        git_ref: Option<&str>,
    ) -> Result<CachedCheckout> {
        let dir = self.entry_dir(cache_key, git_ref, None);

        if !self.git.is_checkout(&dir).await {
            info!(url = %url, git_ref = ?git_ref, "cloning");
            let staging = self.staging_dir(&dir)?;
            let work = staging.path().join("checkout");
            self.git.clone_repo(url, &work, git_ref).await?;
            touch_marker(&work)?;
            install_entry(&work, &dir)?;
            self.refreshed.lock().insert(dir.clone());
        } else if !self.refreshed.lock().contains(&dir) && self.is_stale(&dir) {
            info!(url = %url, git_ref = ?git_ref, "refreshing stale checkout");
            self.git.fetch_and_reset(&dir, git_ref).await?;
            touch_marker(&dir)?;
            self.refreshed.lock().insert(dir.clone());
        } else {
            debug!(key = %cache_key, "checkout is fresh");
        }

        let commit = self.git.head_commit(&dir).await?;
        Ok(CachedCheckout { dir, commit })
    }

    fn is_stale(&self, dir: &Path) -> bool {
        let fetched = std::fs::metadata(dir.join(".git").join(FETCH_MARKER))
            .and_then(|m| m.modified())
            .ok();
        match fetched {
            Some(at) => SystemTime::now()
                .duration_since(at)
                .map(|age| age >= self.settings.ttl)
                .unwrap_or(false),
            None => true,
        }
    }

    /// Temporary directory next to `entry`, so the final rename stays on one
    /// filesystem.
    fn staging_dir(&self, entry: &Path) -> Result<tempfile::TempDir> {
        let parent = entry.parent().unwrap_or(&self.settings.dir);
        std::fs::create_dir_all(parent)?;
        Ok(tempfile::Builder::new()
            .prefix(".skillet-clone-")
            .tempdir_in(parent)?)
    }
}

fn touch_marker(checkout: &Path) -> Result<()> {
    std::fs::write(checkout.join(".git").join(FETCH_MARKER), b"")?;
    Ok(())
}

/// Move a finished checkout into place, replacing a broken leftover.
fn install_entry(work: &Path, dir: &Path) -> Result<()> {
    remove_dir_if_exists(dir)?;
    std::fs::rename(work, dir)?;
    Ok(())
}

fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn sanitize_ref(r: &str) -> String {
    r.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
