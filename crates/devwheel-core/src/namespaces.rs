//! `-nspkg.pth` shims for pkg_resources-style namespace packages.
//!
//! Each line of the generated file is executed by `site` at startup and
//! grafts the editable source directory onto the namespace package's
//! `__path__`, creating the module when no other distribution did.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::effects::NamespaceInstaller;

const NSPKG_EXT: &str = "-nspkg.pth";

/// Writes `{install_dir}/{dist_name}-nspkg.pth` whose module search root is
/// the editable target.
pub struct LegacyNamespaceInstaller;

impl NamespaceInstaller for LegacyNamespaceInstaller {
    fn install_namespaces(
        &self,
        namespaces: &[String],
        install_dir: &Path,
        dist_name: &str,
        target: &Path,
    ) -> Result<Vec<PathBuf>> {
        let packages = all_namespace_packages(namespaces);
        if packages.is_empty() {
            return Ok(Vec::new());
        }
        let filename = nspkg_file(install_dir, dist_name);
        let target = target
            .to_str()
            .with_context(|| format!("editable target {} is not valid UTF-8", target.display()))?;
        let root = python_str_literal(target);
        let body: String = packages
            .iter()
            .map(|pkg| nspkg_line(pkg, &root))
            .collect();
        info!(path = %filename.display(), packages = ?packages, "installing namespace shims");
        fs::write(&filename, body).with_context(|| format!("writing {}", filename.display()))?;
        Ok(vec![filename])
    }
}

/// `{install_dir}/{dist_name}` with any extension swapped for `-nspkg.pth`.
fn nspkg_file(install_dir: &Path, dist_name: &str) -> PathBuf {
    let target = install_dir.join(dist_name);
    let stem = target
        .file_stem()
        .map_or_else(|| dist_name.to_string(), |stem| stem.to_string_lossy().into_owned());
    target.with_file_name(format!("{stem}{NSPKG_EXT}"))
}

/// Every declared package plus all of its parents, sorted.
fn all_namespace_packages(namespaces: &[String]) -> Vec<String> {
    let mut packages = BTreeSet::new();
    for pkg in namespaces {
        let mut parts: Vec<&str> = pkg.split('.').collect();
        while !parts.is_empty() {
            packages.insert(parts.join("."));
            parts.pop();
        }
    }
    packages.into_iter().collect()
}

fn nspkg_line(pkg: &str, root: &str) -> String {
    let parts: Vec<&str> = pkg.split('.').collect();
    let pth = python_tuple_literal(&parts);
    let name = python_str_literal(pkg);
    let mut statements = vec![
        "import sys, types, os".to_string(),
        format!("p = os.path.join({root}, *{pth})"),
        "importlib = __import__('importlib.util')".to_string(),
        "__import__('importlib.machinery')".to_string(),
        format!(
            "m = sys.modules.setdefault({name}, importlib.util.module_from_spec(\
importlib.machinery.PathFinder.find_spec({name}, [os.path.dirname(p)])))"
        ),
        format!("m = m or sys.modules.setdefault({name}, types.ModuleType({name}))"),
        "mp = (m or []) and m.__dict__.setdefault('__path__',[])".to_string(),
        "(p not in mp) and mp.append(p)".to_string(),
    ];
    if let Some((parent, child)) = pkg.rsplit_once('.') {
        statements.push(format!(
            "m and setattr(sys.modules[{}], {}, m)",
            python_str_literal(parent),
            python_str_literal(child)
        ));
    }
    let mut line = statements.join(";");
    line.push('\n');
    line
}

/// Renders `value` the way Python's `repr()` renders a `str`.
pub(crate) fn python_str_literal(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn python_tuple_literal(items: &[&str]) -> String {
    let rendered: Vec<String> = items.iter().map(|item| python_str_literal(item)).collect();
    if rendered.len() == 1 {
        format!("({},)", rendered[0])
    } else {
        format!("({})", rendered.join(", "))
    }
}
