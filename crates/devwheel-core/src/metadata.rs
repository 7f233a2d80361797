//! `.dist-info` generation from `pyproject.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use devwheel_domain::{dist_info_dirname, Contact, ProjectConfig};
use tracing::debug;

use crate::effects::MetadataProvider;
use crate::tags::WheelTag;
use crate::DEVWHEEL_VERSION;

pub struct ProjectMetadataProvider {
    project: ProjectConfig,
}

impl ProjectMetadataProvider {
    pub fn new(project: ProjectConfig) -> Self {
        Self { project }
    }
}

impl MetadataProvider for ProjectMetadataProvider {
    fn generate_metadata(&self, output_dir: &Path) -> Result<PathBuf> {
        let dist_info = output_dir.join(dist_info_dirname(&self.project.name, &self.project.version));
        if dist_info.exists() {
            fs::remove_dir_all(&dist_info)
                .with_context(|| format!("removing stale {}", dist_info.display()))?;
        }
        fs::create_dir_all(&dist_info)
            .with_context(|| format!("creating {}", dist_info.display()))?;

        fs::write(dist_info.join("METADATA"), render_metadata(&self.project))
            .with_context(|| format!("writing METADATA into {}", dist_info.display()))?;
        if let Some(entry_points) = render_entry_points(&self.project) {
            fs::write(dist_info.join("entry_points.txt"), entry_points)
                .with_context(|| format!("writing entry_points.txt into {}", dist_info.display()))?;
        }
        debug!(path = %dist_info.display(), "generated dist-info");
        Ok(dist_info)
    }

    fn write_wheel_file(&self, dist_info_dir: &Path, tag: &WheelTag) -> Result<()> {
        let path = dist_info_dir.join("WHEEL");
        fs::write(&path, render_wheel_file(tag))
            .with_context(|| format!("writing {}", path.display()))
    }
}

pub(crate) fn render_wheel_file(tag: &WheelTag) -> String {
    let mut lines = vec![
        "Wheel-Version: 1.0".to_string(),
        format!("Generator: devwheel ({DEVWHEEL_VERSION})"),
        format!("Root-Is-Purelib: {}", tag.is_pure()),
    ];
    for expanded in tag.expanded() {
        lines.push(format!("Tag: {expanded}"));
    }
    lines.push(String::new());
    lines.join("\n")
}

pub(crate) fn render_metadata(project: &ProjectConfig) -> String {
    let mut lines = Vec::new();
    lines.push("Metadata-Version: 2.1".to_string());
    lines.push(format!("Name: {}", project.name));
    lines.push(format!("Version: {}", project.version));
    if let Some(summary) = &project.summary {
        lines.push(format!("Summary: {summary}"));
    }
    push_contacts(&mut lines, "Author", &project.authors);
    push_contacts(&mut lines, "Maintainer", &project.maintainers);
    if let Some(rp) = &project.requires_python {
        lines.push(format!("Requires-Python: {rp}"));
    }
    for extra in project.optional_requires.keys() {
        lines.push(format!("Provides-Extra: {extra}"));
    }
    for req in &project.requires_dist {
        lines.push(format!("Requires-Dist: {req}"));
    }
    for (extra, reqs) in &project.optional_requires {
        for req in reqs {
            lines.push(format!("Requires-Dist: {}", requirement_for_extra(req, extra)));
        }
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Folds `extra == "{extra}"` into the requirement's marker, keeping any
/// existing marker as a parenthesized conjunct.
fn requirement_for_extra(req: &str, extra: &str) -> String {
    match req.split_once(';') {
        Some((head, marker)) if !marker.trim().is_empty() => format!(
            r#"{}; ({}) and extra == "{extra}""#,
            head.trim_end(),
            marker.trim()
        ),
        Some((head, _)) => format!(r#"{}; extra == "{extra}""#, head.trim_end()),
        None => format!(r#"{req}; extra == "{extra}""#),
    }
}

fn push_contacts(lines: &mut Vec<String>, field: &str, contacts: &[Contact]) {
    let names: Vec<&str> = contacts
        .iter()
        .filter(|contact| contact.email.is_none())
        .filter_map(|contact| contact.name.as_deref())
        .collect();
    if !names.is_empty() {
        lines.push(format!("{field}: {}", names.join(", ")));
    }
    let emails: Vec<String> = contacts
        .iter()
        .filter_map(|contact| match (&contact.name, &contact.email) {
            (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
            (None, Some(email)) => Some(email.clone()),
            _ => None,
        })
        .collect();
    if !emails.is_empty() {
        lines.push(format!("{field}-email: {}", emails.join(", ")));
    }
}

fn render_entry_points(project: &ProjectConfig) -> Option<String> {
    if project.entry_points.is_empty() {
        return None;
    }
    let mut sections = Vec::new();
    for (group, entries) in &project.entry_points {
        sections.push(format!("[{group}]"));
        for (name, target) in entries {
            sections.push(format!("{name} = {target}"));
        }
        sections.push(String::new());
    }
    Some(sections.join("\n"))
}
