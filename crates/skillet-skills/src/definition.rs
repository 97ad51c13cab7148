use serde::{Deserialize, Serialize};
use skillet_core::SkilletError;
use std::path::{Path, PathBuf};

/// Metadata parsed from a SKILL.md file.
///
/// Only the frontmatter matters to the package manager; the body is kept so
/// callers can show it, but it is never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// Skill name (from frontmatter).
    pub name: String,
    /// Short description.
    pub description: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// The Markdown body after the frontmatter.
    #[serde(skip)]
    pub body: String,
    /// Absolute path to the SKILL.md file.
    #[serde(skip)]
    pub file_path: PathBuf,
}

impl SkillDefinition {
    /// Read and parse a SKILL.md file.
    pub fn from_file(path: &Path) -> skillet_core::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| invalid(path, e.to_string()))?;
        Self::parse(&content, path.to_path_buf())
    }

    /// Parse SKILL.md content. `file_path` is only used for error messages
    /// and recorded on the definition.
    pub fn parse(content: &str, file_path: PathBuf) -> skillet_core::Result<Self> {
        let (frontmatter, body) =
            split_frontmatter(content).map_err(|reason| invalid(&file_path, reason))?;

        let mut def = parse_frontmatter(&frontmatter);
        def.body = body;
        def.file_path = file_path;

        if def.name.is_empty() {
            return Err(invalid(&def.file_path, "skill name is empty".into()));
        }
        if def.description.is_empty() {
            return Err(invalid(
                &def.file_path,
                format!("skill '{}' has no description", def.name),
            ));
        }

        Ok(def)
    }

    /// Directory holding the SKILL.md file.
    pub fn base_dir(&self) -> &Path {
        self.file_path.parent().unwrap_or(Path::new("."))
    }
}

fn invalid(path: &Path, reason: String) -> SkilletError {
    SkilletError::InvalidSkill {
        path: path.display().to_string(),
        reason,
    }
}

/// `(frontmatter, body)` of a SKILL.md document delimited by `---` lines.
fn split_frontmatter(content: &str) -> Result<(String, String), String> {
    let rest = content
        .trim_start_matches('\u{feff}')
        .trim()
        .strip_prefix("---")
        .ok_or("SKILL.md must start with YAML frontmatter (---)")?;
    let (frontmatter, body) = rest
        .split_once("\n---")
        .ok_or("missing closing --- for frontmatter")?;
    Ok((frontmatter.trim().to_string(), body.trim().to_string()))
}

/// Parse simple YAML frontmatter. Supports `name`, `description`, `version`,
/// `tags` and `author`, with folded (`>`) and literal (`|`) block scalars for
/// the description.
fn parse_frontmatter(yaml: &str) -> SkillDefinition {
    let mut def = SkillDefinition {
        name: String::new(),
        description: String::new(),
        version: None,
        tags: Vec::new(),
        author: None,
        body: String::new(),
        file_path: PathBuf::new(),
    };

    let mut lines = yaml.lines().peekable();
    while let Some(raw) = lines.next() {
        // Nested keys (e.g. under `metadata:`) are not ours.
        if raw.starts_with(' ') || raw.starts_with('\t') {
            continue;
        }
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let mut value = value.trim().to_string();

        if matches!(value.as_str(), ">" | "|" | ">-" | "|-") {
            let folded = value.starts_with('>');
            let mut block = Vec::new();
            while let Some(next) = lines.peek() {
                if next.trim().is_empty() || next.starts_with(' ') || next.starts_with('\t') {
                    block.push(next.trim().to_string());
                    lines.next();
                } else {
                    break;
                }
            }
            let sep = if folded { " " } else { "\n" };
            value = block
                .into_iter()
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(sep);
        }

        match key.trim() {
            "name" => def.name = unquote(&value),
            "description" => def.description = unquote(&value),
            "version" => def.version = Some(unquote(&value)),
            "author" => def.author = Some(unquote(&value)),
            "tags" => {
                def.tags = value
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .split(',')
                    .map(unquote)
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            _ => {}
        }
    }

    def
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    ['"', '\'']
        .iter()
        .find_map(|q| s.strip_prefix(*q).and_then(|inner| inner.strip_suffix(*q)))
        .unwrap_or(s)
        .to_string()
}
