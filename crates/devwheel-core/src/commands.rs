use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use devwheel_domain::{discover_project_root, ProjectConfig, ProjectError};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::config::{BuildOptions, Config};
use crate::editable::EditableWheelBuilder;
use crate::effects::{Collaborators, MetadataProvider};
use crate::error::DistInfoError;
use crate::metadata::ProjectMetadataProvider;
use crate::outcome::ExecutionOutcome;

/// Builds a PEP 660 editable wheel for the project.
///
/// # Errors
/// Returns an error when a collaborator or the filesystem fails; problems
/// with the caller's inputs are reported as user-error outcomes instead.
pub fn build_editable(options: &BuildOptions, config: &Config) -> Result<ExecutionOutcome> {
    let (project, dist_dir) = match load_project(options)? {
        Ok(loaded) => loaded,
        Err(outcome) => return Ok(outcome),
    };
    let collaborators = Collaborators::system(&project, config);
    let project_root = project.root.clone();
    let builder = EditableWheelBuilder::new(project, dist_dir, collaborators)
        .with_dist_info_dir(
            options
                .dist_info_dir
                .as_ref()
                .map(|dir| anchor(dir, &project_root)),
        )
        .with_staging_root(
            options
                .staging_root
                .clone()
                .or_else(|| config.staging_root().map(Path::to_path_buf)),
        );

    let wheel = match builder.build() {
        Ok(wheel) => wheel,
        Err(err) => {
            if let Some(invalid) = err.downcast_ref::<DistInfoError>() {
                return Ok(ExecutionOutcome::user_error(
                    format!("devwheel editable: {invalid}"),
                    json!({ "reason": "invalid_dist_info" }),
                ));
            }
            return Err(err);
        }
    };

    let bytes = fs::metadata(&wheel.path)?.len();
    let sha256 = compute_file_sha256(&wheel.path)?;
    let basename = wheel
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ExecutionOutcome::success(
        format!("devwheel editable: wrote {basename}"),
        json!({
            "wheel": basename,
            "path": wheel.path.display().to_string(),
            "bytes": bytes,
            "sha256": sha256,
            "tag": wheel.tag.to_string(),
            "target": wheel.target.display().to_string(),
            "dist_info": wheel.dist_info.display().to_string(),
        }),
    ))
}

/// Writes only the project's `.dist-info` directory into the dist dir.
///
/// # Errors
/// Returns an error if the metadata cannot be written.
pub fn write_dist_info(options: &BuildOptions, _config: &Config) -> Result<ExecutionOutcome> {
    let (project, dist_dir) = match load_project(options)? {
        Ok(loaded) => loaded,
        Err(outcome) => return Ok(outcome),
    };
    fs::create_dir_all(&dist_dir).with_context(|| format!("creating {}", dist_dir.display()))?;
    let dist_info = ProjectMetadataProvider::new(project).generate_metadata(&dist_dir)?;
    let name = dist_info
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ExecutionOutcome::success(
        format!("devwheel dist-info: wrote {name}"),
        json!({
            "dist_info": dist_info.display().to_string(),
        }),
    ))
}

type Loaded = std::result::Result<(ProjectConfig, PathBuf), ExecutionOutcome>;

fn load_project(options: &BuildOptions) -> Result<Loaded> {
    let cwd = env::current_dir().context("unable to determine the working directory")?;
    let project_dir = match &options.project_dir {
        Some(dir) => anchor(dir, &cwd),
        None => match discover_project_root(&cwd) {
            Some(dir) => dir,
            None => {
                return Ok(Err(ExecutionOutcome::user_error(
                    "no pyproject.toml found in this directory or any parent",
                    json!({ "reason": "missing_project", "cwd": cwd.display().to_string() }),
                )))
            }
        },
    };
    let project = match ProjectConfig::load(&project_dir) {
        Ok(project) => project,
        Err(err) => {
            if let Some(invalid) = err.downcast_ref::<ProjectError>() {
                return Ok(Err(ExecutionOutcome::user_error(
                    invalid.to_string(),
                    json!({
                        "reason": "invalid_project",
                        "project_dir": project_dir.display().to_string(),
                    }),
                )));
            }
            return Err(err);
        }
    };
    let dist_dir = options.resolve_dist_dir(&project_dir);
    Ok(Ok((project, dist_dir)))
}

fn anchor(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub(crate) fn compute_file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
