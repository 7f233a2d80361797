use std::path::PathBuf;

use anyhow::{anyhow, Result};
use devwheel_domain::ProjectConfig;
use tracing::{debug, info};

use crate::config::Config;
use crate::effects::ExtensionBuilder;
use crate::process::{resolve_python, run_command};

/// Builds declared extension modules in place through `setup.py build_ext`.
pub struct SetuptoolsExtensionBuilder {
    project_dir: PathBuf,
    extensions: Vec<String>,
    config: Config,
}

impl SetuptoolsExtensionBuilder {
    pub fn new(project: &ProjectConfig, config: &Config) -> Self {
        Self {
            project_dir: project.root.clone(),
            extensions: project
                .ext_modules
                .iter()
                .map(|module| module.name.clone())
                .collect(),
            config: config.clone(),
        }
    }
}

impl ExtensionBuilder for SetuptoolsExtensionBuilder {
    fn build_in_place(&self) -> Result<()> {
        if self.extensions.is_empty() {
            debug!("no extension modules declared");
            return Ok(());
        }
        let setup_py = self.project_dir.join("setup.py");
        if !setup_py.is_file() {
            return Err(anyhow!(
                "extension modules {:?} are declared but {} does not exist",
                self.extensions,
                setup_py.display()
            ));
        }
        let python = resolve_python(&self.config)?;
        info!(modules = ?self.extensions, "building extensions in place");
        let args = ["setup.py", "build_ext", "--inplace"].map(String::from);
        let output = run_command(&python, &args, &self.project_dir)?;
        if !output.success() {
            return Err(anyhow!(
                "build_ext failed with exit code {}: {}",
                output.code,
                output.stderr.trim()
            ));
        }
        Ok(())
    }
}
