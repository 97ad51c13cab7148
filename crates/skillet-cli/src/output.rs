//! Terminal rendering of engine reports.

use console::style;
use serde_json::{Map, Value, json};

use skillet_engine::{InstallReport, ListEntry, SymlinkOutcome, SyncReport};

fn short(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

pub fn ok(msg: &str) {
    println!("{} {msg}", style("✓").green());
}

pub fn note(msg: &str) {
    println!("{} {msg}", style("·").dim());
}

pub fn warning(msg: &str) {
    eprintln!("{} {msg}", style("!").yellow().bold());
}

pub fn removed(name: &str) {
    println!("{} {name}", style("-").red());
}

pub fn install_report(report: &InstallReport, frozen: bool) {
    let mut unchanged = 0;
    for skill in &report.installed {
        if !skill.changed {
            unchanged += 1;
            continue;
        }
        let pin = skill.commit.as_deref().map(short).unwrap_or("local");
        println!(
            "{} {} {}",
            style("+").green(),
            style(&skill.name).bold(),
            style(format!("{} @ {pin}", skill.source)).dim()
        );
    }
    for name in &report.pruned {
        removed(name);
    }
    symlinks(&report.symlinks);
    for issue in &report.issues {
        warning(&format!("{} {}: {}", issue.kind, issue.name, issue.detail));
    }

    let changed = report.installed.len() - unchanged;
    let verb = if frozen { "verified" } else { "installed" };
    ok(&format!(
        "{verb} {} skill(s): {changed} changed, {unchanged} up to date",
        report.installed.len()
    ));
}

fn symlinks(outcomes: &[(String, SymlinkOutcome)]) {
    for (agent, outcome) in outcomes {
        match outcome {
            SymlinkOutcome::Created => note(&format!("linked {agent} skills directory")),
            SymlinkOutcome::Replaced => note(&format!("relinked {agent} skills directory")),
            SymlinkOutcome::Migrated { moved } => note(&format!(
                "moved {moved} existing {agent} skill(s) into the store"
            )),
            SymlinkOutcome::Preserved {
                moved,
                preserved_at,
            } => warning(&format!(
                "moved {moved} {agent} skill(s) into the store; colliding entries kept in {}",
                preserved_at.display()
            )),
            SymlinkOutcome::Unchanged => {}
        }
    }
}

pub fn sync_report(report: &SyncReport) {
    for name in &report.adopted {
        println!(
            "{} {} {}",
            style("+").green(),
            style(name).bold(),
            style("adopted into skills.toml").dim()
        );
    }
    for issue in &report.issues {
        let status = if issue.repaired {
            style("repaired").green()
        } else {
            style("unrepaired").red()
        };
        println!(
            "{:>10} {} {}: {}",
            status,
            style(issue.kind).yellow(),
            issue.name,
            issue.detail
        );
    }
    symlinks(&report.install.symlinks);

    let open = report.unrepaired().count();
    if open == 0 {
        ok(&format!("in sync ({} skill(s))", report.install.installed.len()));
    }
}

pub fn sync_json(report: &SyncReport) -> Value {
    let mut out = Map::new();
    out.insert("adopted".into(), json!(report.adopted));
    out.insert("issues".into(), json!(report.issues));
    out.insert("installed".into(), json!(report.install.installed));
    out.insert("pruned".into(), json!(report.install.pruned));
    Value::Object(out)
}

pub fn list(entries: &[ListEntry]) {
    if entries.is_empty() {
        println!("No skills declared.");
        return;
    }
    for entry in entries {
        let origin = if entry.declared { "" } else { " (wildcard)" };
        let lock = match &entry.locked {
            Some(locked) => match locked.commit() {
                Some(commit) => format!("{} {}", locked.kind(), short(commit)),
                None => locked.kind().to_string(),
            },
            None => "not locked".to_string(),
        };
        let state = if entry.installed {
            style("installed").green()
        } else {
            style("missing").red()
        };
        println!(
            "  {}{} {} {}",
            style(&entry.name).bold(),
            style(origin).dim(),
            style(lock).dim(),
            state
        );
    }
}
