//! PEP 660 editable wheels.
//!
//! The wheel carries the project's `.dist-info` plus a
//! `__editable__.{name}.pth` file holding the source directory, so
//! installing it puts the working tree on `sys.path` instead of copying it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use devwheel_domain::{resolve_target, safer_name, ProjectConfig};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::effects::Collaborators;
use crate::error::DistInfoError;
use crate::tags::WheelTag;

/// Build tag marking editable wheels. Wheel build tags must start with a digit.
pub const EDITABLE_BUILD_TAG: &str = "0.editable";

/// A finished editable build.
#[derive(Clone, Debug)]
pub struct EditableWheel {
    pub path: PathBuf,
    pub dist_info: PathBuf,
    pub target: PathBuf,
    pub tag: WheelTag,
}

pub struct EditableWheelBuilder {
    project: ProjectConfig,
    dist_dir: PathBuf,
    dist_info_dir: Option<PathBuf>,
    staging_root: Option<PathBuf>,
    target: PathBuf,
    collaborators: Collaborators,
}

impl EditableWheelBuilder {
    pub fn new(project: ProjectConfig, dist_dir: PathBuf, collaborators: Collaborators) -> Self {
        let target = resolve_target(&project.root, &project.package_dir);
        Self {
            project,
            dist_dir,
            dist_info_dir: None,
            staging_root: None,
            target,
            collaborators,
        }
    }

    /// Reuse an already generated `.dist-info` directory.
    #[must_use]
    pub fn with_dist_info_dir(mut self, dist_info_dir: Option<PathBuf>) -> Self {
        self.dist_info_dir = dist_info_dir;
        self
    }

    /// Create the staging directory under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_staging_root(mut self, root: Option<PathBuf>) -> Self {
        self.staging_root = root;
        self
    }

    /// The normalized directory the wheel points the interpreter at.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Filename-safe distribution name used for the archive and `.pth` files.
    pub fn editable_name(&self) -> String {
        safer_name(&self.project.name)
    }

    /// Builds the editable wheel into the dist dir and returns its location.
    ///
    /// # Errors
    /// Returns [`DistInfoError`] for an unusable pre-built dist-info; failures
    /// of the metadata, tag, extension, and archive collaborators propagate
    /// unchanged.
    pub fn build(&self) -> Result<EditableWheel> {
        fs::create_dir_all(&self.dist_dir)
            .with_context(|| format!("creating {}", self.dist_dir.display()))?;
        let dist_info = self.ensure_dist_info()?;

        let tag = self.collaborators.tags.wheel_tag()?;
        self.collaborators
            .metadata
            .write_wheel_file(&dist_info, &tag)?;
        self.collaborators.extensions.build_in_place()?;

        let editable_name = self.editable_name();
        let archive_name = editable_archive_name(&editable_name, &tag);
        let wheel_path = self.dist_dir.join(&archive_name);
        if wheel_path.exists() {
            debug!(path = %wheel_path.display(), "removing previous editable wheel");
            fs::remove_file(&wheel_path)
                .with_context(|| format!("removing {}", wheel_path.display()))?;
        }

        let staging = self.staging_dir(&archive_name)?;
        self.populate_staging(staging.path(), &dist_info, &editable_name)?;
        self.collaborators
            .archive
            .write_archive(staging.path(), &wheel_path)?;
        staging
            .close()
            .context("removing editable wheel staging directory")?;

        info!(
            wheel = %wheel_path.display(),
            target = %self.target.display(),
            "built editable wheel"
        );
        Ok(EditableWheel {
            path: wheel_path,
            dist_info,
            target: self.target.clone(),
            tag,
        })
    }

    fn ensure_dist_info(&self) -> Result<PathBuf> {
        match &self.dist_info_dir {
            Some(dir) => {
                validate_dist_info(dir)?;
                Ok(dir.clone())
            }
            None => self.collaborators.metadata.generate_metadata(&self.dist_dir),
        }
    }

    fn staging_dir(&self, archive_name: &str) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".devwheel-").suffix(archive_name);
        let staging = match &self.staging_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        staging.context("creating editable wheel staging directory")
    }

    fn populate_staging(&self, staging: &Path, dist_info: &Path, editable_name: &str) -> Result<()> {
        let dist_info_name = dist_info
            .file_name()
            .context("dist-info directory has no name")?;
        copy_tree(dist_info, &staging.join(dist_info_name))?;
        if self.project.has_namespace_packages() {
            self.collaborators.namespaces.install_namespaces(
                &self.project.namespace_packages,
                staging,
                editable_name,
                &self.target,
            )?;
        }
        write_redirect_file(staging, editable_name, &self.target)?;
        Ok(())
    }
}

/// `{name}-0.editable-{tag}.whl`
pub fn editable_archive_name(editable_name: &str, tag: &WheelTag) -> String {
    format!("{editable_name}-{EDITABLE_BUILD_TAG}-{tag}.whl")
}

/// Checks a caller-supplied `.dist-info` directory.
///
/// # Errors
/// Returns [`DistInfoError`] when the name lacks the `.dist-info` suffix or
/// the directory has no `METADATA` file.
pub fn validate_dist_info(dir: &Path) -> Result<(), DistInfoError> {
    let named_correctly = dir
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".dist-info"));
    if !named_correctly {
        return Err(DistInfoError::BadSuffix {
            path: dir.to_path_buf(),
        });
    }
    if !dir.join("METADATA").is_file() {
        return Err(DistInfoError::MissingMetadata {
            path: dir.to_path_buf(),
        });
    }
    Ok(())
}

/// Writes `__editable__.{name}.pth` containing the target path on one line.
///
/// # Errors
/// Fails when `target` is not valid UTF-8, since `.pth` files are read as text.
pub fn write_redirect_file(dir: &Path, editable_name: &str, target: &Path) -> Result<PathBuf> {
    let target = target
        .to_str()
        .with_context(|| format!("editable target {} is not valid UTF-8", target.display()))?;
    let pth = dir.join(format!("__editable__.{editable_name}.pth"));
    fs::write(&pth, format!("{target}\n"))
        .with_context(|| format!("writing {}", pth.display()))?;
    Ok(pth)
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(from).unwrap_or(path);
        let dest = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)
                .with_context(|| format!("copying {} to {}", path.display(), dest.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{read_archive, WheelArchiveWriter};
    use crate::effects::{
        ArchiveWriter, ExtensionBuilder, MetadataProvider, NamespaceInstaller, TagProvider,
    };
    use crate::metadata::ProjectMetadataProvider;
    use crate::namespaces::LegacyNamespaceInstaller;
    use anyhow::anyhow;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::tempdir;

    struct FixedTag(WheelTag);

    impl TagProvider for FixedTag {
        fn wheel_tag(&self) -> Result<WheelTag> {
            Ok(self.0.clone())
        }
    }

    #[derive(Clone, Default)]
    struct CountingExtensions(Rc<Cell<usize>>);

    impl ExtensionBuilder for CountingExtensions {
        fn build_in_place(&self) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    struct FailingExtensions;

    impl ExtensionBuilder for FailingExtensions {
        fn build_in_place(&self) -> Result<()> {
            Err(anyhow!("gcc: error: missing.c: No such file or directory"))
        }
    }

    struct FailingArchive;

    impl ArchiveWriter for FailingArchive {
        fn write_archive(&self, _staging_dir: &Path, _archive_path: &Path) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    struct PanicsOnGenerate;

    impl MetadataProvider for PanicsOnGenerate {
        fn generate_metadata(&self, _output_dir: &Path) -> Result<PathBuf> {
            Err(anyhow!("metadata generation must not run"))
        }

        fn write_wheel_file(&self, dist_info_dir: &Path, _tag: &WheelTag) -> Result<()> {
            fs::write(dist_info_dir.join("WHEEL"), "Wheel-Version: 1.0\n")?;
            Ok(())
        }
    }

    struct Fixture {
        _temp: tempfile::TempDir,
        root: PathBuf,
        dist: PathBuf,
        staging: PathBuf,
    }

    fn fixture(pyproject: &str) -> Result<Fixture> {
        let temp = tempdir()?;
        let base = devwheel_domain::normalize_path(temp.path(), temp.path());
        let root = base.join("proj");
        let dist = root.join("dist");
        let staging = base.join("staging");
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&staging)?;
        fs::write(root.join("pyproject.toml"), pyproject)?;
        Ok(Fixture {
            _temp: temp,
            root,
            dist,
            staging,
        })
    }

    const FOO: &str = "[project]\nname = \"foo\"\nversion = \"1.0\"\n";

    fn collaborators(project: &ProjectConfig) -> Collaborators {
        Collaborators {
            metadata: Box::new(ProjectMetadataProvider::new(project.clone())),
            extensions: Box::new(CountingExtensions::default()),
            tags: Box::new(FixedTag(WheelTag::pure())),
            archive: Box::new(WheelArchiveWriter::new(Some(0))),
            namespaces: Box::new(LegacyNamespaceInstaller),
        }
    }

    fn builder(fx: &Fixture, collaborators: impl FnOnce(&ProjectConfig) -> Collaborators) -> Result<EditableWheelBuilder> {
        let project = ProjectConfig::load(&fx.root)?;
        let collaborators = collaborators(&project);
        Ok(
            EditableWheelBuilder::new(project, fx.dist.clone(), collaborators)
                .with_staging_root(Some(fx.staging.clone())),
        )
    }

    fn entry<'a>(entries: &'a [(String, Vec<u8>)], name: &str) -> Option<&'a [u8]> {
        entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, body)| body.as_slice())
    }

    #[test]
    fn builds_redirect_wheel_for_project_root() -> Result<()> {
        let fx = fixture(FOO)?;
        let wheel = builder(&fx, collaborators)?.build()?;

        assert_eq!(
            wheel.path,
            fx.dist.join("foo-0.editable-py3-none-any.whl")
        );
        assert_eq!(wheel.target, fx.root);
        let entries = read_archive(&wheel.path)?;
        let expected = format!("{}\n", fx.root.display());
        assert_eq!(
            entry(&entries, "__editable__.foo.pth"),
            Some(expected.as_bytes())
        );
        assert!(entry(&entries, "foo-1.0.dist-info/METADATA").is_some());
        assert!(entry(&entries, "foo-1.0.dist-info/WHEEL").is_some());
        assert!(entry(&entries, "foo-1.0.dist-info/RECORD").is_some());
        assert_eq!(fs::read_dir(&fx.staging)?.count(), 0);
        Ok(())
    }

    #[test]
    fn build_tag_starts_with_a_digit() {
        assert!(EDITABLE_BUILD_TAG
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit()));
        assert_eq!(
            editable_archive_name("foo", &WheelTag::new("cp311", "cp311", "linux_x86_64")),
            "foo-0.editable-cp311-cp311-linux_x86_64.whl"
        );
    }

    #[test]
    fn root_package_dir_becomes_the_target() -> Result<()> {
        let fx = fixture(
            "[project]\nname = \"my-pkg\"\nversion = \"0.3\"\n\n[tool.setuptools]\npackage-dir = { \"\" = \"src\" }\n",
        )?;
        fs::create_dir_all(fx.root.join("src"))?;
        let wheel = builder(&fx, collaborators)?.build()?;

        assert_eq!(wheel.target, fx.root.join("src"));
        let entries = read_archive(&wheel.path)?;
        let expected = format!("{}\n", fx.root.join("src").display());
        assert_eq!(
            entry(&entries, "__editable__.my_pkg.pth"),
            Some(expected.as_bytes())
        );
        Ok(())
    }

    #[test]
    fn previous_wheel_is_replaced() -> Result<()> {
        let fx = fixture(FOO)?;
        fs::create_dir_all(&fx.dist)?;
        let wheel_path = fx.dist.join("foo-0.editable-py3-none-any.whl");
        fs::write(&wheel_path, b"not a zip")?;

        builder(&fx, collaborators)?.build()?;

        let bytes = fs::read(&wheel_path)?;
        assert_ne!(bytes, b"not a zip");
        assert!(read_archive(&wheel_path).is_ok());
        Ok(())
    }

    #[test]
    fn supplied_dist_info_is_used_without_regenerating() -> Result<()> {
        let fx = fixture(FOO)?;
        let prebuilt = fx.root.join("prebuilt").join("foo-1.0.dist-info");
        fs::create_dir_all(&prebuilt)?;
        fs::write(prebuilt.join("METADATA"), "Metadata-Version: 2.1\nName: foo\nVersion: 1.0\n")?;

        let wheel = builder(&fx, |project| Collaborators {
            metadata: Box::new(PanicsOnGenerate),
            ..collaborators(project)
        })?
        .with_dist_info_dir(Some(prebuilt.clone()))
        .build()?;

        assert_eq!(wheel.dist_info, prebuilt);
        assert!(prebuilt.join("WHEEL").is_file());
        let entries = read_archive(&wheel.path)?;
        assert!(entry(&entries, "foo-1.0.dist-info/WHEEL").is_some());
        Ok(())
    }

    #[test]
    fn bad_suffix_is_a_validation_error() -> Result<()> {
        let fx = fixture(FOO)?;
        let bogus = fx.root.join("foo-1.0.egg-info");
        fs::create_dir_all(&bogus)?;
        fs::write(bogus.join("METADATA"), "Name: foo\n")?;

        let err = builder(&fx, collaborators)?
            .with_dist_info_dir(Some(bogus.clone()))
            .build()
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DistInfoError>(),
            Some(&DistInfoError::BadSuffix { path: bogus })
        );
        assert!(!fx.dist.join("foo-0.editable-py3-none-any.whl").exists());
        Ok(())
    }

    #[test]
    fn missing_metadata_is_a_validation_error() -> Result<()> {
        let fx = fixture(FOO)?;
        let empty = fx.root.join("foo-1.0.dist-info");
        fs::create_dir_all(&empty)?;

        let err = builder(&fx, collaborators)?
            .with_dist_info_dir(Some(empty.clone()))
            .build()
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DistInfoError>(),
            Some(&DistInfoError::MissingMetadata { path: empty })
        );
        assert!(!fx.dist.join("foo-0.editable-py3-none-any.whl").exists());
        Ok(())
    }

    #[test]
    fn archive_failure_cleans_staging_and_leaves_no_wheel() -> Result<()> {
        let fx = fixture(FOO)?;
        let err = builder(&fx, |project| Collaborators {
            archive: Box::new(FailingArchive),
            ..collaborators(project)
        })?
        .build()
        .unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert_eq!(fs::read_dir(&fx.staging)?.count(), 0);
        assert!(!fx.dist.join("foo-0.editable-py3-none-any.whl").exists());
        Ok(())
    }

    #[test]
    fn extension_failure_propagates_unchanged() -> Result<()> {
        let fx = fixture(FOO)?;
        let err = builder(&fx, |project| Collaborators {
            extensions: Box::new(FailingExtensions),
            ..collaborators(project)
        })?
        .build()
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "gcc: error: missing.c: No such file or directory"
        );
        assert_eq!(fs::read_dir(&fx.staging)?.count(), 0);
        Ok(())
    }

    #[test]
    fn extensions_are_built_once_per_build() -> Result<()> {
        let fx = fixture(FOO)?;
        let counter = CountingExtensions::default();
        let handle = counter.clone();
        let builder = builder(&fx, move |project| Collaborators {
            extensions: Box::new(counter),
            ..collaborators(project)
        })?;
        builder.build()?;
        builder.build()?;
        assert_eq!(handle.0.get(), 2);
        Ok(())
    }

    #[test]
    fn legacy_namespaces_get_shims() -> Result<()> {
        let fx = fixture(
            "[project]\nname = \"ns.sub\"\nversion = \"1.0\"\n\n[tool.setuptools]\nnamespace-packages = [\"ns\", \"ns.sub\"]\n",
        )?;
        let wheel = builder(&fx, collaborators)?.build()?;

        let entries = read_archive(&wheel.path)?;
        let shim = entry(&entries, "ns-nspkg.pth").expect("namespace shim in wheel");
        let shim = String::from_utf8(shim.to_vec())?;
        let root = crate::namespaces::python_str_literal(&fx.root.to_string_lossy());
        assert!(shim.contains(&format!("os.path.join({root}, *('ns', 'sub'))")));
        assert!(shim.contains("setattr(sys.modules['ns'], 'sub', m)"));
        assert!(entry(&entries, "__editable__.ns.sub.pth").is_some());
        Ok(())
    }

    #[test]
    fn namespace_installer_receives_staging_name_and_target() -> Result<()> {
        struct Recording(Rc<std::cell::RefCell<Vec<(Vec<String>, String, PathBuf)>>>);

        impl NamespaceInstaller for Recording {
            fn install_namespaces(
                &self,
                namespaces: &[String],
                install_dir: &Path,
                dist_name: &str,
                target: &Path,
            ) -> Result<Vec<PathBuf>> {
                assert!(install_dir.is_dir());
                self.0.borrow_mut().push((
                    namespaces.to_vec(),
                    dist_name.to_string(),
                    target.to_path_buf(),
                ));
                Ok(Vec::new())
            }
        }

        let fx = fixture(
            "[project]\nname = \"Foo-Bar\"\nversion = \"2.0\"\n\n[tool.setuptools]\nnamespace-packages = [\"acme\"]\n",
        )?;
        let calls = Rc::new(std::cell::RefCell::new(Vec::new()));
        let recorder = Recording(Rc::clone(&calls));
        builder(&fx, move |project| Collaborators {
            namespaces: Box::new(recorder),
            ..collaborators(project)
        })?
        .build()?;

        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec!["acme".to_string()]);
        assert_eq!(calls[0].1, "Foo_Bar");
        assert_eq!(calls[0].2, fx.root);
        Ok(())
    }

    #[test]
    fn redirect_file_holds_exactly_the_target() -> Result<()> {
        let staging = tempdir()?;
        let target = staging.path().join("src");
        let pth = write_redirect_file(staging.path(), "foo", &target)?;
        assert_eq!(pth, staging.path().join("__editable__.foo.pth"));
        assert_eq!(fs::read_to_string(&pth)?, format!("{}\n", target.display()));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_target_is_rejected() -> Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let staging = tempdir()?;
        let target = staging.path().join(OsStr::from_bytes(b"src\xff"));
        let err = write_redirect_file(staging.path(), "foo", &target).expect_err("non-UTF-8 target");
        assert!(format!("{err:#}").contains("not valid UTF-8"));
        assert!(!staging.path().join("__editable__.foo.pth").exists());
        Ok(())
    }
}
