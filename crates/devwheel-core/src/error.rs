use std::path::PathBuf;

/// Problems with a `.dist-info` directory handed in by the caller.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DistInfoError {
    #[error("dist-info directory must end with `.dist-info` (got '{}')", path.display())]
    BadSuffix { path: PathBuf },
    #[error("dist-info directory {} has no METADATA file", path.display())]
    MissingMetadata { path: PathBuf },
}
