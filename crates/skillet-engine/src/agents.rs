use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use skillet_core::{HookDecl, Manifest, Result, ServerDecl, SkilletError};

use crate::sync::{IssueKind, SyncIssue};

/// Whether a config file belongs to the agent alone or is shared with the
/// user's own settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPolicy {
    /// Read, merge our keys in, write back. Other keys are left alone.
    Shared,
    /// Owned entirely; overwritten.
    Dedicated,
}

/// A JSON config file an agent reads, relative to the scope's targets base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigFile {
    pub path: &'static str,
    pub policy: ConfigPolicy,
}

/// One supported agent tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTarget {
    pub name: &'static str,
    /// Directory holding the agent's `skills` entry.
    pub dir: &'static str,
    pub mcp: Option<ConfigFile>,
    pub hooks: Option<ConfigFile>,
    /// Key holding server declarations in the MCP file.
    pub servers_key: &'static str,
}

const AGENT_TARGETS: &[AgentTarget] = &[
    AgentTarget {
        name: "claude",
        dir: ".claude",
        mcp: Some(ConfigFile {
            path: ".mcp.json",
            policy: ConfigPolicy::Shared,
        }),
        hooks: Some(ConfigFile {
            path: ".claude/settings.json",
            policy: ConfigPolicy::Shared,
        }),
        servers_key: "mcpServers",
    },
    AgentTarget {
        name: "cursor",
        dir: ".cursor",
        mcp: Some(ConfigFile {
            path: ".cursor/mcp.json",
            policy: ConfigPolicy::Dedicated,
        }),
        hooks: None,
        servers_key: "mcpServers",
    },
    AgentTarget {
        name: "codex",
        dir: ".codex",
        mcp: None,
        hooks: None,
        servers_key: "mcp_servers",
    },
    AgentTarget {
        name: "gemini",
        dir: ".gemini",
        mcp: Some(ConfigFile {
            path: ".gemini/settings.json",
            policy: ConfigPolicy::Shared,
        }),
        hooks: None,
        servers_key: "mcpServers",
    },
    AgentTarget {
        name: "windsurf",
        dir: ".windsurf",
        mcp: None,
        hooks: None,
        servers_key: "mcpServers",
    },
    AgentTarget {
        name: "copilot",
        dir: ".github",
        mcp: Some(ConfigFile {
            path: ".vscode/mcp.json",
            policy: ConfigPolicy::Shared,
        }),
        hooks: None,
        servers_key: "servers",
    },
];

/// Look up a built-in target by name. `claude-code` and `github-copilot` are
/// accepted as aliases.
pub fn agent_target(name: &str) -> Option<&'static AgentTarget> {
    let name = match name.to_ascii_lowercase().as_str() {
        "claude-code" => "claude".to_string(),
        "github-copilot" => "copilot".to_string(),
        other => other.to_string(),
    };
    AGENT_TARGETS.iter().find(|t| t.name == name)
}

pub fn known_targets() -> impl Iterator<Item = &'static str> {
    AGENT_TARGETS.iter().map(|t| t.name)
}

/// Turns universal declarations into an agent's native JSON shape.
pub trait ConfigWriter: Send + Sync {
    fn serialize_server(&self, name: &str, server: &ServerDecl) -> Value;
    fn serialize_hooks(&self, hooks: &[HookDecl]) -> Value;
    fn servers_key(&self) -> &str;
}

/// The `mcpServers`-style JSON layout most agents share.
#[derive(Debug, Clone)]
pub struct JsonConfigWriter {
    servers_key: String,
}

impl JsonConfigWriter {
    pub fn new(servers_key: impl Into<String>) -> Self {
        Self {
            servers_key: servers_key.into(),
        }
    }

    pub fn for_target(target: &AgentTarget) -> Self {
        Self::new(target.servers_key)
    }
}

impl ConfigWriter for JsonConfigWriter {
    fn serialize_server(&self, _name: &str, server: &ServerDecl) -> Value {
        let mut out = Map::new();
        if let Some(url) = &server.url {
            out.insert("type".into(), json!("http"));
            out.insert("url".into(), json!(url));
        } else if let Some(command) = &server.command {
            out.insert("command".into(), json!(command));
            out.insert("args".into(), json!(server.args));
        }
        if !server.env.is_empty() {
            out.insert("env".into(), json!(server.env));
        }
        Value::Object(out)
    }

    /// `{ "<event>": [ { "matcher": ..., "hooks": [ { "type": "command", "command": ... } ] } ] }`
    fn serialize_hooks(&self, hooks: &[HookDecl]) -> Value {
        let mut by_event: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
        for hook in hooks {
            let mut group = Map::new();
            if let Some(matcher) = &hook.matcher {
                group.insert("matcher".into(), json!(matcher));
            }
            group.insert(
                "hooks".into(),
                json!([{ "type": "command", "command": hook.command }]),
            );
            by_event
                .entry(hook.event.as_str())
                .or_default()
                .push(Value::Object(group));
        }
        json!(by_event)
    }

    fn servers_key(&self) -> &str {
        &self.servers_key
    }
}

/// Config writer for a built-in target. Every built-in file is JSON.
pub fn writer_for(target: &AgentTarget) -> Box<dyn ConfigWriter> {
    Box::new(JsonConfigWriter::for_target(target))
}

/// What to write into one config file.
struct PlannedWrite {
    file: PathBuf,
    policy: ConfigPolicy,
    key: String,
    value: Value,
    kind: IssueKind,
    target: &'static str,
}

/// Bring every target's MCP and hook config files in line with the manifest.
///
/// Nothing is written for a section the manifest leaves empty. Targets that
/// resolve to the same physical file are written once. Returns an `mcp` or
/// `hooks` issue for every file that had to change (marked repaired) or
/// could not be written.
pub fn reconcile_agent_configs(
    targets_base: &Path,
    targets: &[&'static AgentTarget],
    manifest: &Manifest,
) -> Vec<SyncIssue> {
    let mut plans = Vec::new();
    let mut seen: HashSet<(PathBuf, String)> = HashSet::new();

    for target in targets {
        let writer = writer_for(target);

        if let Some(cfg) = target.mcp.filter(|_| !manifest.mcp.is_empty()) {
            let servers: Map<String, Value> = manifest
                .mcp
                .iter()
                .map(|(name, decl)| (name.clone(), writer.serialize_server(name, decl)))
                .collect();
            plans.push(PlannedWrite {
                file: targets_base.join(cfg.path),
                policy: cfg.policy,
                key: writer.servers_key().to_string(),
                value: Value::Object(servers),
                kind: IssueKind::Mcp,
                target: target.name,
            });
        }

        if let Some(cfg) = target.hooks.filter(|_| !manifest.hooks.is_empty()) {
            plans.push(PlannedWrite {
                file: targets_base.join(cfg.path),
                policy: cfg.policy,
                key: "hooks".to_string(),
                value: writer.serialize_hooks(&manifest.hooks),
                kind: IssueKind::Hooks,
                target: target.name,
            });
        }
    }

    let mut issues = Vec::new();
    for plan in plans {
        let identity = (physical_path(&plan.file), plan.key.clone());
        if !seen.insert(identity) {
            debug!(file = ?plan.file, agent = plan.target, "config file already handled");
            continue;
        }
        match apply(&plan) {
            Ok(false) => {}
            Ok(true) => {
                info!(file = ?plan.file, agent = plan.target, "updated agent config");
                issues.push(SyncIssue {
                    kind: plan.kind,
                    name: plan.target.to_string(),
                    detail: format!("{} was out of date", plan.file.display()),
                    repaired: true,
                });
            }
            Err(e) => {
                warn!(file = ?plan.file, error = %e, "cannot update agent config");
                issues.push(SyncIssue {
                    kind: plan.kind,
                    name: plan.target.to_string(),
                    detail: e.to_string(),
                    repaired: false,
                });
            }
        }
    }
    issues
}

/// Write `plan` if the file's current content differs. Returns whether a
/// write happened.
fn apply(plan: &PlannedWrite) -> Result<bool> {
    let existing = read_json(&plan.file)?;

    let desired = match (plan.policy, existing.clone()) {
        (ConfigPolicy::Shared, Some(Value::Object(mut doc))) => {
            let section = doc
                .entry(plan.key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            match (section, &plan.value) {
                (Value::Object(current), Value::Object(ours)) => {
                    for (k, v) in ours {
                        if plan.kind == IssueKind::Hooks {
                            if let (Some(Value::Array(groups)), Value::Array(wanted)) =
                                (current.get_mut(k), v)
                            {
                                merge_hook_groups(groups, wanted);
                                continue;
                            }
                        }
                        current.insert(k.clone(), v.clone());
                    }
                }
                (slot, ours) => *slot = ours.clone(),
            }
            Value::Object(doc)
        }
        (ConfigPolicy::Shared, Some(_)) => {
            return Err(SkilletError::Config(format!(
                "{} is not a JSON object",
                plan.file.display()
            )));
        }
        _ => {
            let mut doc = Map::new();
            doc.insert(plan.key.clone(), plan.value.clone());
            Value::Object(doc)
        }
    };

    if existing.as_ref() == Some(&desired) {
        return Ok(false);
    }

    if let Some(parent) = plan.file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = serde_json::to_string_pretty(&desired)?;
    text.push('\n');
    std::fs::write(&plan.file, text)?;
    Ok(true)
}

/// Hook groups for one event: ours replace a group with the same matcher and
/// commands, or are appended. The user's other groups stay.
fn merge_hook_groups(groups: &mut Vec<Value>, ours: &[Value]) {
    for group in ours {
        let key = hook_group_key(group);
        match groups.iter_mut().find(|g| hook_group_key(g) == key) {
            Some(slot) => *slot = group.clone(),
            None => groups.push(group.clone()),
        }
    }
}

fn hook_group_key(group: &Value) -> (Option<&str>, Vec<&str>) {
    let matcher = group.get("matcher").and_then(Value::as_str);
    let commands = group
        .get("hooks")
        .and_then(Value::as_array)
        .map(|hooks| {
            hooks
                .iter()
                .filter_map(|h| h.get("command").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    (matcher, commands)
}

fn read_json(path: &Path) -> Result<Option<Value>> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(None),
        Ok(text) => serde_json::from_str(&text).map(Some).map_err(|e| {
            SkilletError::Config(format!("{} is not valid JSON: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Canonical path of `file`, resolving symlinked parent directories even
/// when the file itself does not exist yet.
fn physical_path(file: &Path) -> PathBuf {
    if let Ok(p) = file.canonicalize() {
        return p;
    }
    match (file.parent().map(Path::canonicalize), file.file_name()) {
        (Some(Ok(parent)), Some(name)) => parent.join(name),
        _ => file.to_path_buf(),
    }
}
