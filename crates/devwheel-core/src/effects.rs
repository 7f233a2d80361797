//! Collaborator seams of the editable build.
//!
//! The builder only sequences these calls; every piece of real work sits
//! behind one of the traits below so it can be swapped out.

use std::path::{Path, PathBuf};

use anyhow::Result;
use devwheel_domain::ProjectConfig;

use crate::archive::WheelArchiveWriter;
use crate::config::Config;
use crate::extensions::SetuptoolsExtensionBuilder;
use crate::metadata::ProjectMetadataProvider;
use crate::namespaces::LegacyNamespaceInstaller;
use crate::tags::{InterpreterTagProvider, WheelTag};

pub trait MetadataProvider {
    /// Writes a fresh `.dist-info` directory under `output_dir` and returns it.
    fn generate_metadata(&self, output_dir: &Path) -> Result<PathBuf>;
    /// Adds the wheel-level `WHEEL` file to `dist_info_dir`.
    fn write_wheel_file(&self, dist_info_dir: &Path, tag: &WheelTag) -> Result<()>;
}

pub trait ExtensionBuilder {
    /// Compiles native extensions next to their sources. Must be a no-op
    /// when there is nothing to build.
    fn build_in_place(&self) -> Result<()>;
}

pub trait TagProvider {
    fn wheel_tag(&self) -> Result<WheelTag>;
}

pub trait ArchiveWriter {
    /// Serializes every file below `staging_dir` into a wheel at `archive_path`.
    fn write_archive(&self, staging_dir: &Path, archive_path: &Path) -> Result<()>;
}

pub trait NamespaceInstaller {
    /// Emits shim files into `install_dir` so legacy namespace packages
    /// resolve to `target`. Returns the files written.
    fn install_namespaces(
        &self,
        namespaces: &[String],
        install_dir: &Path,
        dist_name: &str,
        target: &Path,
    ) -> Result<Vec<PathBuf>>;
}

pub struct Collaborators {
    pub metadata: Box<dyn MetadataProvider>,
    pub extensions: Box<dyn ExtensionBuilder>,
    pub tags: Box<dyn TagProvider>,
    pub archive: Box<dyn ArchiveWriter>,
    pub namespaces: Box<dyn NamespaceInstaller>,
}

impl Collaborators {
    /// Default wiring: metadata from `pyproject.toml`, tags and extension
    /// builds through the configured interpreter, zip serialization.
    #[must_use]
    pub fn system(project: &ProjectConfig, config: &Config) -> Self {
        Self {
            metadata: Box::new(ProjectMetadataProvider::new(project.clone())),
            extensions: Box::new(SetuptoolsExtensionBuilder::new(project, config)),
            tags: Box::new(InterpreterTagProvider::new(project, config)),
            archive: Box::new(WheelArchiveWriter::new(config.source_date_epoch())),
            namespaces: Box::new(LegacyNamespaceInstaller),
        }
    }
}
