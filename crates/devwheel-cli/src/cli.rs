use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use devwheel_core::BuildOptions;

#[derive(Parser, Debug)]
#[command(
    name = "devwheel",
    author,
    version,
    about = "Build PEP 660 editable wheels",
    disable_help_subcommand = true
)]
pub struct DevwheelCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-v debug, -vv trace)", global = true)]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[command(subcommand)]
    pub command: CommandArgs,
}

#[derive(Subcommand, Debug)]
pub enum CommandArgs {
    #[command(about = "Build an editable wheel that points back at the source tree")]
    Editable(EditableArgs),
    #[command(name = "dist-info", about = "Write the project's .dist-info directory")]
    DistInfo(DistInfoArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EditableArgs {
    #[arg(
        short = 'd',
        long = "dist-dir",
        value_name = "DIR",
        help = "Directory to put final built distributions in"
    )]
    pub dist_dir: Option<PathBuf>,
    #[arg(
        short = 'I',
        long = "dist-info-dir",
        value_name = "DIR",
        help = "Path to a pre-built .dist-info directory"
    )]
    pub dist_info_dir: Option<PathBuf>,
    #[arg(long = "project-dir", value_name = "DIR", help = "Project root (defaults to the nearest pyproject.toml)")]
    pub project_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DistInfoArgs {
    #[arg(
        short = 'd',
        long = "dist-dir",
        value_name = "DIR",
        help = "Directory to write the .dist-info directory into"
    )]
    pub dist_dir: Option<PathBuf>,
    #[arg(long = "project-dir", value_name = "DIR", help = "Project root (defaults to the nearest pyproject.toml)")]
    pub project_dir: Option<PathBuf>,
}

impl From<&EditableArgs> for BuildOptions {
    fn from(args: &EditableArgs) -> Self {
        Self {
            project_dir: args.project_dir.clone(),
            dist_dir: args.dist_dir.clone(),
            dist_info_dir: args.dist_info_dir.clone(),
            staging_root: None,
        }
    }
}

impl From<&DistInfoArgs> for BuildOptions {
    fn from(args: &DistInfoArgs) -> Self {
        Self {
            project_dir: args.project_dir.clone(),
            dist_dir: args.dist_dir.clone(),
            ..Self::default()
        }
    }
}
