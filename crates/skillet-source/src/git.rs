use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use skillet_core::{Result, SkilletError};

/// Per-stream cap on captured git output. Anything past it is drained and
/// discarded so the child never blocks on a full pipe.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Narrow interface over the version-control operations the cache needs.
///
/// All arguments are passed as an argument vector, never through a shell.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Shallow clone of `url` into `dest`, optionally at branch/tag `git_ref`.
    async fn clone_repo(&self, url: &str, dest: &Path, git_ref: Option<&str>) -> Result<()>;

    /// Shallow fetch of `git_ref` (a branch, tag, commit, or `HEAD`) from origin.
    async fn fetch_ref(&self, dir: &Path, git_ref: &str) -> Result<()>;

    /// Fetch `git_ref` (remote default branch when `None`) and hard-reset the
    /// working tree to it.
    async fn fetch_and_reset(&self, dir: &Path, git_ref: Option<&str>) -> Result<()>;

    /// Detach the working tree at `commit`.
    async fn checkout_commit(&self, dir: &Path, commit: &str) -> Result<()>;

    /// Full hash of HEAD.
    async fn head_commit(&self, dir: &Path) -> Result<String>;

    /// Whether `dir` is a usable checkout with a resolvable HEAD.
    async fn is_checkout(&self, dir: &Path) -> bool;
}

/// [`GitClient`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct ProcessGit {
    program: PathBuf,
}

impl Default for ProcessGit {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl ProcessGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git binary instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git with `args` in `cwd`, returning captured stdout. Non-zero exit
    /// becomes [`SkilletError::Git`] carrying stderr.
    async fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<String> {
        let command = args.first().copied().unwrap_or_default().to_string();
        debug!(?args, ?cwd, "running git");

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            // Never stop to ask for credentials or passphrases.
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GCM_INTERACTIVE", "never")
            .env("GIT_ASKPASS", "")
            .env("SSH_ASKPASS", "");
        if std::env::var_os("GIT_SSH_COMMAND").is_none() {
            cmd.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| SkilletError::Git {
            command: command.clone(),
            stderr: format!("failed to run {}: {e}", self.program.display()),
            hint: Some("install git and make sure it is on PATH".into()),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (out, err) = tokio::try_join!(read_capped(stdout), read_capped(stderr))?;
        let status = child.wait().await?;

        if !status.success() {
            return Err(SkilletError::Git {
                command,
                stderr: String::from_utf8_lossy(&err).trim().to_string(),
                hint: None,
            });
        }
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }
}

async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(buf);
    };
    (&mut reader)
        .take(MAX_OUTPUT_BYTES as u64)
        .read_to_end(&mut buf)
        .await?;
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok(buf)
}

#[async_trait]
impl GitClient for ProcessGit {
    async fn clone_repo(&self, url: &str, dest: &Path, git_ref: Option<&str>) -> Result<()> {
        let dest_str = dest.to_string_lossy();
        let mut args = vec!["clone", "--depth", "1", "--quiet"];
        if let Some(r) = git_ref {
            args.extend(["--branch", r]);
        }
        args.extend(["--", url, &*dest_str]);

        self.run(&args, None).await.map_err(|e| match e {
            SkilletError::Git {
                command,
                stderr,
                hint,
            } => {
                let hint = auth_hint(url, &stderr).or(hint);
                SkilletError::Git {
                    command,
                    stderr,
                    hint,
                }
            }
            other => other,
        })
        .map(|_| ())
    }

    async fn fetch_ref(&self, dir: &Path, git_ref: &str) -> Result<()> {
        self.run(
            &["fetch", "--depth", "1", "--quiet", "origin", git_ref],
            Some(dir),
        )
        .await
        .map(|_| ())
    }

    async fn fetch_and_reset(&self, dir: &Path, git_ref: Option<&str>) -> Result<()> {
        self.fetch_ref(dir, git_ref.unwrap_or("HEAD")).await?;
        self.run(&["reset", "--hard", "--quiet", "FETCH_HEAD"], Some(dir))
            .await
            .map(|_| ())
    }

    async fn checkout_commit(&self, dir: &Path, commit: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", "--detach", commit], Some(dir))
            .await
            .map(|_| ())
    }

    async fn head_commit(&self, dir: &Path) -> Result<String> {
        self.run(&["rev-parse", "HEAD"], Some(dir)).await
    }

    async fn is_checkout(&self, dir: &Path) -> bool {
        if !dir.join(".git").exists() {
            return false;
        }
        self.run(&["rev-parse", "--verify", "--quiet", "HEAD"], Some(dir))
            .await
            .is_ok()
    }
}

/// Stderr fragments git prints when HTTPS credentials are missing or refused.
const AUTH_FAILURE_SIGNATURES: [&str; 5] = [
    "authentication failed",
    "could not read username",
    "terminal prompts disabled",
    "repository not found",
    "the requested url returned error: 403",
];

/// For a failed clone of `https://github.com/owner/repo`, suggest the SSH URL
/// when the failure looks like missing credentials. Advisory only.
pub fn auth_hint(url: &str, stderr: &str) -> Option<String> {
    let rest = url.strip_prefix("https://github.com/")?;
    let lower = stderr.to_lowercase();
    if !AUTH_FAILURE_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        return None;
    }
    let path = rest.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    Some(format!(
        "the repository may be private; if you have SSH access, use git@github.com:{path}.git as the source"
    ))
}
