use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;

use skillet_core::{Result, SkilletError};

const GITHUB_HOST: &str = "github.com";

/// URL prefixes accepted after `git:`. Anything else could be read by git as
/// an option or a transport helper (`ext::`, `-u...`), so it is refused here.
const ALLOWED_GIT_PREFIXES: [&str; 5] = ["https://", "git://", "ssh://", "git@", "file://"];

static OWNER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,38}$").expect("valid regex"));
static REPO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.][A-Za-z0-9_.-]{0,99}$").expect("valid regex"));
static COMMIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("valid regex"));

/// Parsed form of a dependency's `source` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpecifier {
    GitHub(GitHubSource),
    Git(GitSource),
    Local(LocalSource),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSource {
    pub owner: String,
    pub repo: String,
    pub git_ref: Option<String>,
    /// What `git clone` is given. For URL forms this is the user's URL, so an
    /// SSH source is never silently switched to HTTPS or back.
    pub clone_url: String,
    /// `owner/repo` shorthand rather than a full URL.
    pub shorthand: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub url: String,
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    /// Path relative to the manifest root, as written.
    pub path: String,
}

/// Whether `s` is a full 40-character hex commit id.
pub fn looks_like_commit(s: &str) -> bool {
    COMMIT_RE.is_match(s)
}

impl SourceSpecifier {
    /// Parse a source string.
    ///
    /// - `owner/repo`, `github:owner/repo`, optionally `#ref` or `@ref`
    /// - `https://github.com/owner/repo[.git][#ref | /tree/<ref>]`
    /// - `git@github.com:owner/repo[.git][#ref]`, `ssh://git@github.com/owner/repo`
    /// - `git:<url>[#ref]` for any other git remote (or `git://...`)
    /// - `./path`, `../path`, `path:<relative>` for local directories
    pub fn parse(source: &str) -> Result<Self> {
        let s = source.trim();
        if s.is_empty() {
            return Err(SkilletError::specifier(source, "empty source"));
        }
        if s.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(SkilletError::specifier(
                source,
                "whitespace and control characters are not allowed",
            ));
        }

        if let Some(rest) = s.strip_prefix("path:") {
            return parse_local(source, rest);
        }
        if s == "." || s == ".." || s.starts_with("./") || s.starts_with("../") {
            return parse_local(source, s);
        }

        if s.starts_with("git://") {
            return parse_generic_git(source, s);
        }
        if let Some(rest) = s.strip_prefix("git:") {
            return parse_generic_git(source, rest);
        }

        if let Some(rest) = s.strip_prefix("github:") {
            return parse_shorthand(source, rest);
        }

        if s.starts_with("https://") || s.starts_with("http://") || s.starts_with("ssh://") {
            return parse_github_url(source, s);
        }
        if s.starts_with("git@") {
            return parse_github_scp(source, s);
        }

        parse_shorthand(source, s)
    }

    /// Key under which the checkout is cached.
    pub fn cache_key(&self) -> String {
        match self {
            SourceSpecifier::GitHub(gh) => github_key(&gh.owner, &gh.repo),
            SourceSpecifier::Git(g) => match github_owner_repo(&g.url) {
                Some((owner, repo)) => github_key(&owner, &repo),
                None => sanitize_key(&g.url),
            },
            SourceSpecifier::Local(l) => format!("local/{}", sanitize_key(&l.path)),
        }
    }

    /// Ref embedded in the source string, if any.
    pub fn git_ref(&self) -> Option<&str> {
        match self {
            SourceSpecifier::GitHub(gh) => gh.git_ref.as_deref(),
            SourceSpecifier::Git(g) => g.git_ref.as_deref(),
            SourceSpecifier::Local(_) => None,
        }
    }

    /// URL to hand to `git clone`. `None` for local sources.
    pub fn clone_url(&self) -> Option<&str> {
        match self {
            SourceSpecifier::GitHub(gh) => Some(&gh.clone_url),
            SourceSpecifier::Git(g) => Some(&g.url),
            SourceSpecifier::Local(_) => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, SourceSpecifier::Local(_))
    }

    /// Canonical identity used to compare sources: lowercase `owner/repo` for
    /// anything hosted on GitHub regardless of protocol or `.git` suffix.
    pub fn canonical(&self) -> String {
        match self {
            SourceSpecifier::GitHub(gh) => {
                format!("{}/{}", gh.owner.to_lowercase(), gh.repo.to_lowercase())
            }
            SourceSpecifier::Git(g) => match github_owner_repo(&g.url) {
                Some((owner, repo)) => format!("{owner}/{repo}"),
                None => normalize_url(&g.url),
            },
            SourceSpecifier::Local(l) => format!("path:{}", normalize_local(&l.path)),
        }
    }

    /// Whether two specifiers denote the same repository (refs ignored).
    pub fn same_repository(&self, other: &SourceSpecifier) -> bool {
        self.canonical() == other.canonical()
    }
}

impl fmt::Display for SourceSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpecifier::GitHub(gh) if gh.shorthand => write!(f, "{}/{}", gh.owner, gh.repo),
            SourceSpecifier::GitHub(gh) => write!(f, "{}", gh.clone_url),
            SourceSpecifier::Git(g) => write!(f, "{}", g.url),
            SourceSpecifier::Local(l) => write!(f, "{}", l.path),
        }
    }
}

// ── Parsers ────────────────────────────────────────────────────

fn parse_local(source: &str, path: &str) -> Result<SourceSpecifier> {
    if path.is_empty() {
        return Err(SkilletError::specifier(source, "empty local path"));
    }
    if Path::new(path).is_absolute() {
        return Err(SkilletError::specifier(
            source,
            "local paths must be relative to the manifest; use git:<path> for a repository elsewhere",
        ));
    }
    Ok(SourceSpecifier::Local(LocalSource {
        path: path.to_string(),
    }))
}

fn parse_generic_git(source: &str, rest: &str) -> Result<SourceSpecifier> {
    let (url, git_ref) = split_ref(source, rest, '#')?;
    let allowed = ALLOWED_GIT_PREFIXES.iter().any(|p| url.starts_with(p))
        || Path::new(url).is_absolute();
    if !allowed {
        return Err(SkilletError::specifier(
            source,
            "git URLs must start with https://, git://, ssh://, git@, file:// or be an absolute path",
        ));
    }
    if url.starts_with("git@") && !url.contains(':') {
        return Err(SkilletError::specifier(source, "expected git@host:path"));
    }
    let bare = url
        .trim_start_matches("https://")
        .trim_start_matches("git://")
        .trim_start_matches("ssh://")
        .trim_start_matches("file://")
        .trim_start_matches("git@");
    if bare.trim_matches('/').is_empty() {
        return Err(SkilletError::specifier(source, "git URL has no host or path"));
    }
    Ok(SourceSpecifier::Git(GitSource {
        url: url.to_string(),
        git_ref,
    }))
}

fn parse_shorthand(source: &str, rest: &str) -> Result<SourceSpecifier> {
    let (repo_part, git_ref) = if rest.contains('#') {
        split_ref(source, rest, '#')?
    } else {
        split_ref(source, rest, '@')?
    };

    let mut parts = repo_part.split('/');
    let (Some(owner), Some(repo), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(SkilletError::specifier(
            source,
            "expected owner/repo, git:<url>, or a ./relative path",
        ));
    };
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    validate_owner_repo(source, owner, repo)?;

    Ok(SourceSpecifier::GitHub(GitHubSource {
        owner: owner.to_string(),
        repo: repo.to_string(),
        git_ref,
        clone_url: format!("https://{GITHUB_HOST}/{owner}/{repo}.git"),
        shorthand: true,
    }))
}

fn parse_github_url(source: &str, s: &str) -> Result<SourceSpecifier> {
    let (without_ref, mut git_ref) = split_ref(source, s, '#')?;
    let url = url::Url::parse(without_ref)
        .map_err(|e| SkilletError::specifier(source, format!("invalid URL: {e}")))?;

    let host = url.host_str().unwrap_or_default().to_lowercase();
    if host != GITHUB_HOST && host != "www.github.com" {
        return Err(SkilletError::specifier(
            source,
            format!("'{host}' is not GitHub; write git:{without_ref} for other hosts"),
        ));
    }
    if url.scheme() == "http" {
        return Err(SkilletError::specifier(source, "use https:// instead of http://"));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    let (owner, repo_raw) = match segments.as_slice() {
        [owner, repo, ..] => (*owner, *repo),
        _ => {
            return Err(SkilletError::specifier(source, "expected github.com/owner/repo"));
        }
    };
    let repo = repo_raw.strip_suffix(".git").unwrap_or(repo_raw);
    validate_owner_repo(source, owner, repo)?;

    let clone_url = match &segments[2..] {
        [] => without_ref.to_string(),
        ["tree", rest @ ..] if !rest.is_empty() && url.scheme() == "https" => {
            if git_ref.is_some() {
                return Err(SkilletError::specifier(source, "ref given twice"));
            }
            let tree_ref = rest.join("/");
            validate_ref(source, &tree_ref)?;
            git_ref = Some(tree_ref);
            format!("https://{GITHUB_HOST}/{owner}/{repo}")
        }
        _ => {
            return Err(SkilletError::specifier(
                source,
                "unexpected path after owner/repo; use `path` on the dependency to select a directory",
            ));
        }
    };

    Ok(SourceSpecifier::GitHub(GitHubSource {
        owner: owner.to_string(),
        repo: repo.to_string(),
        git_ref,
        clone_url,
        shorthand: false,
    }))
}

fn parse_github_scp(source: &str, s: &str) -> Result<SourceSpecifier> {
    let (without_ref, git_ref) = split_ref(source, s, '#')?;
    let Some((owner, repo)) = github_owner_repo(without_ref) else {
        return Err(SkilletError::specifier(
            source,
            "only git@github.com:owner/repo is accepted without a prefix; write git:<url> for other hosts",
        ));
    };
    validate_owner_repo(source, &owner, &repo)?;
    // Keep the user's casing for display; canonical() lowercases.
    let path = without_ref
        .split_once(':')
        .map(|(_, p)| p.trim_matches('/'))
        .unwrap_or_default();
    let (raw_owner, raw_repo) = path.split_once('/').unwrap_or((path, ""));
    Ok(SourceSpecifier::GitHub(GitHubSource {
        owner: raw_owner.to_string(),
        repo: raw_repo.strip_suffix(".git").unwrap_or(raw_repo).to_string(),
        git_ref,
        clone_url: without_ref.to_string(),
        shorthand: false,
    }))
}

/// Split `s` at the last `sep` into (body, ref).
fn split_ref<'a>(source: &str, s: &'a str, sep: char) -> Result<(&'a str, Option<String>)> {
    match s.rsplit_once(sep) {
        None => Ok((s, None)),
        Some((body, r)) => {
            validate_ref(source, r)?;
            Ok((body, Some(r.to_string())))
        }
    }
}

fn validate_ref(source: &str, r: &str) -> Result<()> {
    if r.is_empty() {
        return Err(SkilletError::specifier(source, "empty ref"));
    }
    if r.starts_with('-') || r.contains("..") || r.contains(['~', '^', ':', '\\', '?', '*', '[']) {
        return Err(SkilletError::specifier(source, format!("invalid ref '{r}'")));
    }
    Ok(())
}

fn validate_owner_repo(source: &str, owner: &str, repo: &str) -> Result<()> {
    if !OWNER_RE.is_match(owner) {
        return Err(SkilletError::specifier(source, format!("invalid owner '{owner}'")));
    }
    if !REPO_RE.is_match(repo) || repo == "." || repo == ".." {
        return Err(SkilletError::specifier(source, format!("invalid repository '{repo}'")));
    }
    Ok(())
}

// ── Normalization ──────────────────────────────────────────────

/// Extract lowercase `(owner, repo)` from any GitHub URL form.
fn github_owner_repo(url: &str) -> Option<(String, String)> {
    let lower = url.to_lowercase();
    let rest = if let Some(r) = lower.strip_prefix("git@github.com:") {
        r
    } else {
        let no_scheme = lower.split_once("://").map(|(_, r)| r)?;
        let no_user = no_scheme.rsplit_once('@').map_or(no_scheme, |(_, r)| r);
        no_user
            .strip_prefix("github.com/")
            .or_else(|| no_user.strip_prefix("www.github.com/"))
            .or_else(|| no_user.strip_prefix("github.com:22/"))?
    };
    let mut parts = rest.trim_matches('/').split('/');
    let owner = parts.next()?.to_string();
    let repo = parts.next()?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo).to_string();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner, repo))
}

fn github_key(owner: &str, repo: &str) -> String {
    format!(
        "{GITHUB_HOST}/{}/{}",
        owner.to_lowercase(),
        repo.to_lowercase()
    )
}

/// Scheme-less, user-less, `.git`-less, trailing-slash-less URL with a
/// lowercase host.
fn normalize_url(url: &str) -> String {
    let body = if let Some((_, rest)) = url.split_once("://") {
        rest.to_string()
    } else if let Some(rest) = url.strip_prefix("git@") {
        rest.replacen(':', "/", 1)
    } else {
        // Absolute filesystem path.
        let trimmed = url.trim_end_matches('/');
        return trimmed.strip_suffix(".git").unwrap_or(trimmed).to_string();
    };
    let body = body.trim_end_matches('/');
    let body = body.strip_suffix(".git").unwrap_or(body);
    match body.split_once('/') {
        Some((authority, path)) => {
            let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
            format!("{}/{}", host.to_lowercase(), path)
        }
        None => {
            let host = body.rsplit_once('@').map_or(body, |(_, h)| h);
            host.to_lowercase()
        }
    }
}

fn normalize_local(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let mut out: Vec<&str> = Vec::new();
    for part in trimmed.split('/') {
        match part {
            "" | "." => {}
            p => out.push(p),
        }
    }
    if out.is_empty() {
        ".".into()
    } else {
        out.join("/")
    }
}

/// Turn a URL into a relative, filesystem-safe cache path.
fn sanitize_key(raw: &str) -> String {
    let normalized = normalize_url(raw);
    let mut segments = Vec::new();
    for seg in normalized.split('/') {
        if seg.is_empty() || seg == "." {
            continue;
        }
        let cleaned: String = seg
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let cleaned = if cleaned.chars().all(|c| c == '.') {
            cleaned.replace('.', "_")
        } else {
            cleaned
        };
        segments.push(cleaned);
    }
    if segments.is_empty() {
        "_".into()
    } else {
        segments.join("/")
    }
}
