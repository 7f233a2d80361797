//! Process configuration and per-build options.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const PYTHON_ENV: &str = "DEVWHEEL_PYTHON";
pub const STAGING_DIR_ENV: &str = "DEVWHEEL_STAGING_DIR";
pub const SOURCE_DATE_EPOCH_ENV: &str = "SOURCE_DATE_EPOCH";

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub(crate) python: Option<String>,
    pub(crate) source_date_epoch: Option<i64>,
    pub(crate) staging_root: Option<PathBuf>,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error if `SOURCE_DATE_EPOCH` is set but is not an integer.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let source_date_epoch = snapshot
            .var(SOURCE_DATE_EPOCH_ENV)
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .with_context(|| format!("{SOURCE_DATE_EPOCH_ENV} must be an integer (got '{raw}')"))
            })
            .transpose()?;
        Ok(Self {
            python: snapshot.var(PYTHON_ENV).map(ToOwned::to_owned),
            source_date_epoch,
            staging_root: snapshot.var(STAGING_DIR_ENV).map(PathBuf::from),
        })
    }

    #[must_use]
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = Some(python.into());
        self
    }

    #[must_use]
    pub fn with_source_date_epoch(mut self, epoch: i64) -> Self {
        self.source_date_epoch = Some(epoch);
        self
    }

    #[must_use]
    pub fn python(&self) -> Option<&str> {
        self.python.as_deref()
    }

    #[must_use]
    pub fn source_date_epoch(&self) -> Option<i64> {
        self.source_date_epoch
    }

    #[must_use]
    pub fn staging_root(&self) -> Option<&Path> {
        self.staging_root.as_deref()
    }
}

/// What to build and where to put it.
#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    /// Project root. Discovered from the working directory when unset.
    pub project_dir: Option<PathBuf>,
    /// Output directory for built distributions; `{project}/dist` when unset.
    pub dist_dir: Option<PathBuf>,
    /// Pre-built `.dist-info` directory to reuse instead of generating one.
    pub dist_info_dir: Option<PathBuf>,
    /// Parent for the staging directory; falls back to the config, then the
    /// system temp dir.
    pub staging_root: Option<PathBuf>,
}

impl BuildOptions {
    pub(crate) fn resolve_dist_dir(&self, project_dir: &Path) -> PathBuf {
        match &self.dist_dir {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => project_dir.join(path),
            None => project_dir.join("dist"),
        }
    }
}
