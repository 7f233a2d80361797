#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod names;
pub mod paths;
pub mod project;

pub use names::{dist_info_dirname, safer_name, safer_version};
pub use paths::{normalize_path, resolve_target};
pub use project::{
    discover_project_root, Contact, ExtensionModule, ProjectConfig, ProjectError, PYPROJECT,
};
