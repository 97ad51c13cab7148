use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::{Path, PathBuf};
use tracing::debug;

use skillet_config::{ConfigLoader, SkilletConfig, WarningSeverity};
use skillet_core::{Result, SkilletError};
use skillet_engine::{AllowList, InstallOptions, Installer, Resolver, Scope};
use skillet_source::{CacheSettings, ObjectCache};

use crate::output;

/// Skill dependency manager for coding agents
#[derive(Parser)]
#[command(name = "skillet", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to skillet.toml config file
    #[arg(short, long, global = true, env = "SKILLET_CONFIG")]
    config: Option<PathBuf>,

    /// Operate on ~/.agents/skills.toml instead of the project manifest
    #[arg(short, long, global = true)]
    global: bool,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true, conflicts_with = "global")]
    dir: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install every skill the manifest declares
    Install {
        /// Fail instead of changing skills.lock
        #[arg(long, conflicts_with = "force")]
        frozen: bool,
        /// Ignore lock pins and resolve everything again
        #[arg(long)]
        force: bool,
    },
    /// Re-resolve skills past their lock pins (all when none are named)
    Update {
        names: Vec<String>,
    },
    /// Detect and repair drift between manifest, lockfile, store and agents
    Sync {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a skill from the manifest, lockfile and store
    Remove {
        name: String,
    },
    /// List declared and locked skills
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or edit skillet.toml
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the config file location
    Path,
    /// Check the configuration for mistakes
    Validate,
    /// Set a value in skillet.toml (dot-notation key)
    Set {
        /// Config key in dot notation (e.g. cache.ttl_hours)
        key: String,
        /// Value to set
        value: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_tracing(log_level, &config.logging.format);

        match self.command {
            Commands::Install { frozen, force } => {
                let installer = build_installer(&config, self.global, self.dir.as_deref())?;
                let report = installer.install(InstallOptions { frozen, force }).await?;
                output::install_report(&report, frozen);
                Ok(())
            }
            Commands::Update { ref names } => {
                let installer = build_installer(&config, self.global, self.dir.as_deref())?;
                let report = installer.update(names).await?;
                output::install_report(&report, false);
                Ok(())
            }
            Commands::Sync { json } => {
                let installer = build_installer(&config, self.global, self.dir.as_deref())?;
                let report = installer.sync().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&output::sync_json(&report))?);
                } else {
                    output::sync_report(&report);
                }
                match report.unrepaired().count() {
                    0 => Ok(()),
                    n => Err(anyhow::anyhow!("{n} issue(s) could not be repaired").into()),
                }
            }
            Commands::Remove { ref name } => {
                let installer = build_installer(&config, self.global, self.dir.as_deref())?;
                installer.remove(name)?;
                output::removed(name);
                Ok(())
            }
            Commands::List { json } => {
                let installer = build_installer(&config, self.global, self.dir.as_deref())?;
                let entries = installer.list()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else {
                    output::list(&entries);
                }
                Ok(())
            }
            Commands::Config { action } => Self::cmd_config(config, config_loader.path(), action),
            Commands::Completions { shell } => {
                let mut cmd = Cli::command();
                generate(shell, &mut cmd, "skillet", &mut std::io::stdout());
                Ok(())
            }
        }
    }

    fn cmd_config(
        config: SkilletConfig,
        path: &Path,
        action: Option<ConfigAction>,
    ) -> Result<()> {
        match action.unwrap_or(ConfigAction::Show { json: false }) {
            ConfigAction::Show { json: true } => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Show { json: false } => {
                println!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Path => println!("{}", path.display()),
            ConfigAction::Validate => {
                let warnings = config.validate().map_err(SkilletError::Config)?;
                if warnings.is_empty() {
                    output::ok(&format!("{} is valid", path.display()));
                }
                for w in &warnings {
                    match w.severity {
                        WarningSeverity::Info => output::note(&w.to_string()),
                        _ => output::warning(&w.to_string()),
                    }
                }
            }
            ConfigAction::Set { key, value } => {
                let old = set_config_value(path, &key, &value)?;
                match old {
                    Some(old) => output::ok(&format!("{key} = {value} (was {old})")),
                    None => output::ok(&format!("{key} = {value} (new)")),
                }
            }
        }
        Ok(())
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        "json" => builder.json().with_target(true).init(),
        "compact" => builder.compact().with_target(false).init(),
        _ => builder.with_target(false).init(),
    }
}

/// Installer for the selected scope, wired to the configured cache, trust
/// list and default targets.
fn build_installer(config: &SkilletConfig, global: bool, dir: Option<&Path>) -> Result<Installer> {
    let scope = if global {
        Scope::user()?
    } else {
        let root = match dir {
            Some(d) => d.to_path_buf(),
            None => std::env::current_dir()?,
        };
        Scope::Project(root)
    };
    let layout = scope.layout();
    debug!(manifest = ?layout.manifest_path, store = ?layout.store_dir, "scope");

    let cache = ObjectCache::with_process_git(CacheSettings::new(
        config.cache.resolved_dir(),
        config.cache.ttl(),
    ));
    let mut installer = Installer::new(layout, Resolver::new(cache))
        .with_default_targets(config.agents.default_targets.clone());
    if !config.trust.allow.is_empty() {
        installer = installer.with_trust(AllowList::new(&config.trust.allow));
    }
    Ok(installer)
}

/// Write `key = value` into the TOML file at `path`, keeping its formatting.
/// The edited document must still parse as a [`SkilletConfig`]. Returns the
/// previous value, if any.
pub fn set_config_value(path: &Path, key: &str, value: &str) -> Result<Option<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(SkilletError::Config(format!(
                "cannot read {}: {e}",
                path.display()
            )));
        }
    };
    let mut doc = content.parse::<toml_edit::DocumentMut>().map_err(|e| {
        SkilletError::Config(format!("invalid TOML in {}: {e}", path.display()))
    })?;

    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, tables)) = parts.split_last().filter(|_| parts.iter().all(|p| !p.is_empty()))
    else {
        return Err(SkilletError::Config(format!("invalid key '{key}'")));
    };

    let mut table: &mut toml_edit::Item = doc.as_item_mut();
    for part in tables {
        if table.get(part).is_none() {
            table[part] = toml_edit::Item::Table(toml_edit::Table::new());
        }
        table = &mut table[part];
    }

    // bool, integer, array of strings (comma separated in brackets), string
    let new_value = if value == "true" {
        toml_edit::value(true)
    } else if value == "false" {
        toml_edit::value(false)
    } else if let Ok(i) = value.parse::<i64>() {
        toml_edit::value(i)
    } else if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        let items: toml_edit::Array = inner
            .split(',')
            .map(|s| s.trim().trim_matches('"'))
            .filter(|s| !s.is_empty())
            .collect();
        toml_edit::value(items)
    } else {
        toml_edit::value(value)
    };

    let old = table
        .get(leaf)
        .map(|v| v.to_string().trim().to_string());
    table[*leaf] = new_value;

    let rendered = doc.to_string();
    toml::from_str::<SkilletConfig>(&rendered).map_err(|e| {
        SkilletError::Config(format!("'{key} = {value}' does not fit the config schema: {e}"))
    })?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, rendered).map_err(|e| {
        SkilletError::Config(format!("cannot write {}: {e}", path.display()))
    })?;
    Ok(old)
}
