//! # skillet-skills
//!
//! A skill is a directory containing a `SKILL.md` file (Markdown with YAML
//! frontmatter). This crate parses that file and finds skills inside checked
//! out repositories, whatever layout the repository uses.
//!
//! ## SKILL.md Format
//!
//! ```markdown
//! ---
//! name: pdf
//! description: Extract text and tables from PDF files
//! version: 1.0.0
//! tags: [documents, pdf]
//! ---
//!
//! # PDF
//!
//! ## Instructions
//! ...
//! ```
//!
//! ## Where skills are looked for
//!
//! 1. `<name>/` at the repository root
//! 2. `skills/<name>/`
//! 3. `.claude/skills/<name>/`
//! 4. `.agents/skills/<name>/`
//! 5. `plugins/*/skills/<name>/` (marketplace layout)
//! 6. the repository root itself, when its `SKILL.md` declares the name

pub mod definition;
pub mod discovery;

pub use definition::SkillDefinition;
pub use discovery::{DiscoveredSkill, discover_all_skills, discover_skill, load_skill_at};
