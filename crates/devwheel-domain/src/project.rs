use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use toml_edit::{DocumentMut, Item, Table, TableLike, Value};
use tracing::debug;

pub const PYPROJECT: &str = "pyproject.toml";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProjectError {
    #[error("no pyproject.toml found at {}", path.display())]
    MissingManifest { path: PathBuf },
    #[error("pyproject.toml is missing [project].{field}")]
    MissingField { field: &'static str },
    #[error("[project].version is dynamic; editable builds need a static version")]
    DynamicVersion,
    #[error("[tool.setuptools].ext-modules entry #{index} is missing a name")]
    UnnamedExtension { index: usize },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// A native extension declared under `[tool.setuptools].ext-modules`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionModule {
    pub name: String,
    pub sources: Vec<String>,
}

/// The parts of `pyproject.toml` an editable build needs.
#[derive(Clone, Debug, Default)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub name: String,
    pub version: String,
    pub summary: Option<String>,
    pub requires_python: Option<String>,
    pub requires_dist: Vec<String>,
    pub optional_requires: IndexMap<String, Vec<String>>,
    pub authors: Vec<Contact>,
    pub maintainers: Vec<Contact>,
    pub entry_points: IndexMap<String, IndexMap<String, String>>,
    pub package_dir: IndexMap<String, String>,
    pub namespace_packages: Vec<String>,
    pub ext_modules: Vec<ExtensionModule>,
}

impl ProjectConfig {
    /// Reads `{project_dir}/pyproject.toml`.
    ///
    /// # Errors
    /// Returns [`ProjectError`] for missing manifests or required fields and
    /// a parse error for malformed TOML.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let manifest = project_dir.join(PYPROJECT);
        if !manifest.exists() {
            return Err(ProjectError::MissingManifest { path: manifest }.into());
        }
        let contents = fs::read_to_string(&manifest)
            .with_context(|| format!("reading {}", manifest.display()))?;
        let config = Self::parse(project_dir, &contents)
            .with_context(|| format!("parsing {}", manifest.display()))?;
        debug!(
            name = %config.name,
            version = %config.version,
            namespaces = config.namespace_packages.len(),
            extensions = config.ext_modules.len(),
            "loaded project"
        );
        Ok(config)
    }

    pub fn parse(project_dir: &Path, contents: &str) -> Result<Self> {
        let doc: DocumentMut = contents.parse()?;
        let project = doc
            .get("project")
            .and_then(Item::as_table_like)
            .ok_or(ProjectError::MissingField { field: "name" })?;
        let name = string_field(project, "name")
            .ok_or(ProjectError::MissingField { field: "name" })?;
        let version = match string_field(project, "version") {
            Some(version) => version,
            None if declares_dynamic(project, "version") => {
                return Err(ProjectError::DynamicVersion.into())
            }
            None => return Err(ProjectError::MissingField { field: "version" }.into()),
        };

        let setuptools = doc
            .get("tool")
            .and_then(Item::as_table_like)
            .and_then(|tool| tool.get("setuptools"))
            .and_then(Item::as_table_like);

        Ok(Self {
            root: project_dir.to_path_buf(),
            name,
            version,
            summary: string_field(project, "description"),
            requires_python: string_field(project, "requires-python"),
            requires_dist: string_array(project.get("dependencies")),
            optional_requires: collect_optional_dependencies(project),
            authors: collect_contacts(project.get("authors")),
            maintainers: collect_contacts(project.get("maintainers")),
            entry_points: collect_entry_points(project),
            package_dir: setuptools
                .and_then(|table| table.get("package-dir"))
                .map(string_table)
                .unwrap_or_default(),
            namespace_packages: string_array(
                setuptools.and_then(|table| table.get("namespace-packages")),
            ),
            ext_modules: collect_extensions(setuptools.and_then(|table| table.get("ext-modules")))?,
        })
    }

    pub fn has_namespace_packages(&self) -> bool {
        !self.namespace_packages.is_empty()
    }

    pub fn has_ext_modules(&self) -> bool {
        !self.ext_modules.is_empty()
    }
}

/// Walks up from `start` to the first directory holding a `pyproject.toml`.
pub fn discover_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(PYPROJECT).is_file() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

fn string_field(table: &dyn TableLike, key: &str) -> Option<String> {
    table
        .get(key)
        .and_then(Item::as_str)
        .map(ToString::to_string)
}

fn declares_dynamic(project: &dyn TableLike, field: &str) -> bool {
    string_array(project.get("dynamic"))
        .iter()
        .any(|entry| entry == field)
}

fn string_array(item: Option<&Item>) -> Vec<String> {
    item.and_then(Item::as_array)
        .map(|array| {
            array
                .iter()
                .filter_map(|value| value.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn string_table(item: &Item) -> IndexMap<String, String> {
    let mut mapped = IndexMap::new();
    if let Some(table) = item.as_table_like() {
        for (key, value) in table.iter() {
            if let Some(value) = value.as_str() {
                mapped.insert(key.to_string(), value.to_string());
            }
        }
    }
    mapped
}

fn collect_optional_dependencies(project: &dyn TableLike) -> IndexMap<String, Vec<String>> {
    let mut extras = IndexMap::new();
    if let Some(optional) = project
        .get("optional-dependencies")
        .and_then(Item::as_table_like)
    {
        for (name, array) in optional.iter() {
            let deps = string_array(Some(array));
            if !deps.is_empty() {
                extras.insert(name.to_string(), deps);
            }
        }
    }
    extras
}

fn collect_contacts(item: Option<&Item>) -> Vec<Contact> {
    table_entries(item)
        .into_iter()
        .map(|table| Contact {
            name: string_field(table, "name"),
            email: string_field(table, "email"),
        })
        .filter(|contact| contact.name.is_some() || contact.email.is_some())
        .collect()
}

/// Tables of an inline array or of a `[[...]]` array of tables.
fn table_entries(item: Option<&Item>) -> Vec<&dyn TableLike> {
    let Some(item) = item else {
        return Vec::new();
    };
    if let Some(array) = item.as_array_of_tables() {
        array.iter().map(|table: &Table| table as &dyn TableLike).collect()
    } else if let Some(array) = item.as_array() {
        array
            .iter()
            .filter_map(Value::as_inline_table)
            .map(|table| table as &dyn TableLike)
            .collect()
    } else {
        Vec::new()
    }
}

fn collect_entry_points(project: &dyn TableLike) -> IndexMap<String, IndexMap<String, String>> {
    let mut groups = IndexMap::new();
    for (key, group) in [("scripts", "console_scripts"), ("gui-scripts", "gui_scripts")] {
        if let Some(item) = project.get(key) {
            let mapped = string_table(item);
            if !mapped.is_empty() {
                groups.insert(group.to_string(), mapped);
            }
        }
    }
    if let Some(table) = project.get("entry-points").and_then(Item::as_table_like) {
        for (group, entries) in table.iter() {
            let mapped = string_table(entries);
            if !mapped.is_empty() {
                groups.insert(group.to_string(), mapped);
            }
        }
    }
    groups
}

fn collect_extensions(item: Option<&Item>) -> Result<Vec<ExtensionModule>> {
    let tables = table_entries(item);
    tables
        .into_iter()
        .enumerate()
        .map(|(index, table)| -> Result<ExtensionModule> {
            let name =
                string_field(table, "name").ok_or(ProjectError::UnnamedExtension { index })?;
            Ok(ExtensionModule {
                name,
                sources: string_array(table.get("sources")),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FULL: &str = r#"
[project]
name = "demo-pkg"
version = "1.2.0"
description = "Demo package"
requires-python = ">=3.9"
dependencies = ["requests>=2"]
authors = [{ name = "Ada", email = "ada@example.com" }, { name = "Grace" }]

[project.optional-dependencies]
zeta = ["pytest"]
alpha = ["sphinx"]

[project.scripts]
demo = "demo_pkg.cli:main"

[tool.setuptools]
package-dir = { "" = "src" }
namespace-packages = ["ns", "ns.sub"]

[[tool.setuptools.ext-modules]]
name = "demo_pkg._speedups"
sources = ["src/demo_pkg/_speedups.c"]
"#;

    #[test]
    fn parses_project_and_setuptools_tables() -> Result<()> {
        let config = ProjectConfig::parse(Path::new("/proj"), FULL)?;
        assert_eq!(config.name, "demo-pkg");
        assert_eq!(config.version, "1.2.0");
        assert_eq!(config.summary.as_deref(), Some("Demo package"));
        assert_eq!(config.requires_dist, vec!["requests>=2".to_string()]);
        assert_eq!(
            config.optional_requires.keys().collect::<Vec<_>>(),
            vec!["zeta", "alpha"],
            "extras keep declaration order"
        );
        assert_eq!(config.authors.len(), 2);
        assert_eq!(config.authors[1].email, None);
        assert_eq!(
            config.entry_points["console_scripts"]["demo"],
            "demo_pkg.cli:main"
        );
        assert_eq!(config.package_dir.get("").map(String::as_str), Some("src"));
        assert_eq!(config.namespace_packages, vec!["ns", "ns.sub"]);
        assert_eq!(config.ext_modules.len(), 1);
        assert_eq!(config.ext_modules[0].name, "demo_pkg._speedups");
        assert!(config.has_namespace_packages());
        assert!(config.has_ext_modules());
        Ok(())
    }

    #[test]
    fn minimal_project_has_no_legacy_features() -> Result<()> {
        let config = ProjectConfig::parse(
            Path::new("/proj"),
            "[project]\nname = \"foo\"\nversion = \"1.0\"\n",
        )?;
        assert!(config.package_dir.is_empty());
        assert!(!config.has_namespace_packages());
        assert!(!config.has_ext_modules());
        Ok(())
    }

    #[test]
    fn array_of_tables_contacts_are_read() -> Result<()> {
        let config = ProjectConfig::parse(
            Path::new("/proj"),
            r#"
[project]
name = "foo"
version = "1.0"

[[project.authors]]
name = "Ada"
email = "ada@example.com"

[[project.authors]]
name = "Grace"

[[project.maintainers]]
email = "ops@example.com"
"#,
        )?;
        assert_eq!(
            config.authors,
            vec![
                Contact {
                    name: Some("Ada".to_string()),
                    email: Some("ada@example.com".to_string()),
                },
                Contact {
                    name: Some("Grace".to_string()),
                    email: None,
                },
            ]
        );
        assert_eq!(config.maintainers.len(), 1);
        assert_eq!(config.maintainers[0].email.as_deref(), Some("ops@example.com"));
        Ok(())
    }

    #[test]
    fn dynamic_version_is_rejected() {
        let err = ProjectConfig::parse(
            Path::new("/proj"),
            "[project]\nname = \"foo\"\ndynamic = [\"version\"]\n",
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProjectError>(),
            Some(&ProjectError::DynamicVersion)
        );
    }

    #[test]
    fn missing_name_is_reported() {
        let err = ProjectConfig::parse(Path::new("/proj"), "[project]\nversion = \"1\"\n")
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProjectError>(),
            Some(&ProjectError::MissingField { field: "name" })
        );
    }

    #[test]
    fn load_reports_missing_manifest() -> Result<()> {
        let temp = tempdir()?;
        let err = ProjectConfig::load(temp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProjectError>(),
            Some(ProjectError::MissingManifest { .. })
        ));
        Ok(())
    }

    #[test]
    fn discover_walks_up_to_manifest() -> Result<()> {
        let temp = tempdir()?;
        fs::write(temp.path().join(PYPROJECT), "[project]\n")?;
        let nested = temp.path().join("src").join("pkg");
        fs::create_dir_all(&nested)?;
        assert_eq!(
            discover_project_root(&nested),
            Some(temp.path().to_path_buf())
        );
        Ok(())
    }
}
