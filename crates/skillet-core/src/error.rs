use thiserror::Error;

/// Unified error type for the skillet engine.
#[derive(Error, Debug)]
pub enum SkilletError {
    // ── Source parsing ─────────────────────────────────────────
    #[error("invalid source '{source_str}': {reason}")]
    Specifier { source_str: String, reason: String },

    #[error("source not trusted: {0}")]
    Untrusted(String),

    // ── Git / cache ────────────────────────────────────────────
    #[error("{}", format_git_error(.command, .stderr, .hint))]
    Git {
        command: String,
        stderr: String,
        hint: Option<String>,
    },

    // ── Discovery / resolution ─────────────────────────────────
    #[error("invalid skill at {path}: {reason}")]
    InvalidSkill { path: String, reason: String },

    #[error(
        "skill '{name}' not found in {source_str}; set `path = \"<dir>\"` on the dependency to point at it explicitly"
    )]
    SkillNotFound { name: String, source_str: String },

    #[error("cannot resolve '{name}': {reason}")]
    Resolve { name: String, reason: String },

    #[error("path '{path}' escapes {root}")]
    PathEscape { path: String, root: String },

    #[error("wildcard conflict: skill '{name}' is provided by both {first} and {second}")]
    WildcardConflict {
        name: String,
        first: String,
        second: String,
    },

    // ── Integrity / lockfile ───────────────────────────────────
    #[error("integrity mismatch for '{name}': locked {expected}, found {actual}")]
    IntegrityMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("frozen lockfile: {0}")]
    FrozenLockfile(String),

    #[error("lockfile error: {0}")]
    Lockfile(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    // ── Filesystem reconciliation ──────────────────────────────
    #[error("symlink error at {path}: {reason}")]
    Symlink { path: String, reason: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("toml write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

fn format_git_error(command: &str, stderr: &str, hint: &Option<String>) -> String {
    let mut msg = format!("git {command} failed");
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        msg.push_str(": ");
        msg.push_str(stderr);
    }
    if let Some(hint) = hint {
        msg.push_str("\nhint: ");
        msg.push_str(hint);
    }
    msg
}

impl SkilletError {
    pub fn specifier(source: &str, reason: impl Into<String>) -> Self {
        Self::Specifier {
            source_str: source.to_string(),
            reason: reason.into(),
        }
    }

    pub fn resolve(name: &str, reason: impl Into<String>) -> Self {
        Self::Resolve {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SkilletError>;
