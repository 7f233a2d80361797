//! Import-root resolution for editable installs.
//!
//! Paths are compared against what other tooling records, so the same
//! directory must always normalize to the same spelling: absolute, lexically
//! clean, symlinks resolved as far as the path exists, and case-folded where
//! the filesystem is case-insensitive.

use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

/// Directory the editable install should expose on `sys.path`.
///
/// The root-package entry (`""`) of `package_dir` wins over the project
/// directory; relative mappings are anchored at `project_dir`.
pub fn resolve_target(project_dir: &Path, package_dir: &IndexMap<String, String>) -> PathBuf {
    let mapped = package_dir
        .get("")
        .map(String::as_str)
        .filter(|value| !value.is_empty());
    let target = match mapped {
        Some(dir) => normalize_path(Path::new(dir), project_dir),
        None => normalize_path(project_dir, project_dir),
    };
    debug!(target = %target.display(), mapped = mapped.is_some(), "resolved editable target");
    target
}

/// Normalizes `path` for identity comparisons. Relative paths are joined
/// onto `base`. The path does not need to exist.
pub fn normalize_path(path: &Path, base: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        absolutize(base).join(path)
    };
    let cleaned = lexical_normalize(&absolute);
    normcase(resolve_existing_prefix(&cleaned))
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_)) | None
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolves symlinks for the deepest ancestor that exists and re-attaches
/// the missing tail unchanged.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(resolved) = dunce::canonicalize(current) {
            let mut result = resolved;
            for part in missing.iter().rev() {
                result.push(part);
            }
            return result;
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(windows)]
fn normcase(path: PathBuf) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase().replace('/', "\\"))
}

#[cfg(not(windows))]
fn normcase(path: PathBuf) -> PathBuf {
    path
}
