#![deny(clippy::all)]

mod archive;
mod commands;
mod config;
mod editable;
mod error;
mod extensions;
mod metadata;
mod namespaces;
mod outcome;
mod process;
mod tags;

pub mod effects;

pub const DEVWHEEL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::archive::WheelArchiveWriter;
pub use crate::commands::{build_editable, write_dist_info};
pub use crate::config::{BuildOptions, Config, PYTHON_ENV, SOURCE_DATE_EPOCH_ENV, STAGING_DIR_ENV};
pub use crate::editable::{
    editable_archive_name, validate_dist_info, write_redirect_file, EditableWheel,
    EditableWheelBuilder, EDITABLE_BUILD_TAG,
};
pub use crate::effects::Collaborators;
pub use crate::error::DistInfoError;
pub use crate::extensions::SetuptoolsExtensionBuilder;
pub use crate::metadata::ProjectMetadataProvider;
pub use crate::namespaces::LegacyNamespaceInstaller;
pub use crate::outcome::{CommandStatus, ExecutionOutcome};
pub use crate::process::{run_command, RunOutput};
pub use crate::tags::{InterpreterTagProvider, WheelTag};

pub use devwheel_domain::ProjectConfig;
