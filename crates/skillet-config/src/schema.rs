use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration, read from `skillet.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkilletConfig {
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub agents: AgentsConfig,
    pub trust: TrustConfig,
}

// ── Cache ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Base directory for git checkouts. None = platform cache dir.
    pub dir: Option<PathBuf>,
    /// Hours before an unpinned checkout is re-fetched.
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_hours: 24,
        }
    }
}

impl CacheConfig {
    /// The configured cache directory, or `<platform cache>/skillet/git`.
    pub fn resolved_dir(&self) -> PathBuf {
        match self.dir {
            Some(ref d) => d.clone(),
            None => dirs::cache_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("skillet")
                .join("git"),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "pretty".into(),
        }
    }
}

// ── Agents ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Targets used when a manifest does not list any.
    pub default_targets: Vec<String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default_targets: vec!["claude".into()],
        }
    }
}

// ── Trust ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Allowed source prefixes, e.g. "anthropics/" or "github.com/acme/".
    /// Empty = every source is trusted.
    pub allow: Vec<String>,
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "note",
        };
        write!(f, "{}: {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl SkilletConfig {
    /// Check the config for mistakes. Errors fail the whole check; warnings
    /// and notes are returned for the caller to print.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Cache ───
        if let Some(ref dir) = self.cache.dir {
            if dir.as_os_str().is_empty() {
                warnings.push(ConfigWarning {
                    field: "cache.dir".into(),
                    message: "cache directory is empty".into(),
                    severity: WarningSeverity::Error,
                    hint: Some("Remove the key to use the platform cache directory".into()),
                });
            } else if dir.is_relative() {
                warnings.push(ConfigWarning {
                    field: "cache.dir".into(),
                    message: format!(
                        "'{}' is relative; it will resolve against the working directory",
                        dir.display()
                    ),
                    severity: WarningSeverity::Warning,
                    hint: Some("Use an absolute path".into()),
                });
            }
        }
        if self.cache.ttl_hours == 0 {
            warnings.push(ConfigWarning {
                field: "cache.ttl_hours".into(),
                message: "TTL is 0: unpinned sources are re-fetched on every run".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Agents ───
        if self.agents.default_targets.is_empty() {
            warnings.push(ConfigWarning {
                field: "agents.default_targets".into(),
                message: "no default targets; manifests without `targets` link nothing".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to e.g. [\"claude\"]".into()),
            });
        }

        // ── Trust ───
        for prefix in &self.trust.allow {
            if prefix.contains("://") {
                warnings.push(ConfigWarning {
                    field: "trust.allow".into(),
                    message: format!("'{prefix}' looks like a URL and will never match"),
                    severity: WarningSeverity::Warning,
                    hint: Some("Use an owner or host prefix such as \"anthropics\" or \"gitlab.com/team\"".into()),
                });
            }
        }

        // ── Logging ───
        let choices: [(&str, &str, &[&str]); 2] = [
            ("logging.format", self.logging.format.as_str(), &["pretty", "json", "compact"]),
            ("logging.level", self.logging.level.as_str(), &["trace", "debug", "info", "warn", "error"]),
        ];
        for (field, value, allowed) in choices {
            if !allowed.contains(&value) {
                warnings.push(ConfigWarning {
                    field: field.into(),
                    message: format!("'{value}' is not recognised"),
                    severity: WarningSeverity::Warning,
                    hint: Some(format!("one of: {}", allowed.join(", "))),
                });
            }
        }

        let errors: Vec<&ConfigWarning> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .collect();
        if !errors.is_empty() {
            let lines: Vec<String> = errors.iter().map(|w| format!("  {}: {}", w.field, w.message)).collect();
            return Err(format!("invalid configuration:\n{}", lines.join("\n")));
        }

        Ok(warnings)
    }
}
