//! Archive Packager
//!
//! Lays the rendered artifacts out in a staging directory that mirrors the
//! package structure, then serializes that directory into the container file.
//! The `mimetype` marker is always the first entry and is always stored
//! without compression; every other file is deflated.

use std::{
    env,
    fs::{self, File},
    io::{self, Write},
    path::{Component, Path, PathBuf},
};

use log::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use crate::{
    error::{EpubError, RenderError},
    utils::{MIMETYPE_FILE, local_time},
};

/// A file of the package, with its path relative to the package root
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Artifact {
    pub path: String,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self { path: path.into(), data }
    }
}

/// Temporary directory scoped to a single export
///
/// The directory is removed when the value is dropped, on success
/// and on every error path alike.
pub(crate) struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    pub fn create(root: Option<&Path>) -> Result<Self, EpubError> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => env::temp_dir(),
        };

        let path = root.join(format!("epub-staging-{}-{}", local_time(), Uuid::new_v4().simple()));
        fs::create_dir_all(&path)?;
        debug!("created staging directory '{}'", path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    /// Remove staging directory when dropped
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!("{}", err);
        };
    }
}

/// Output file that is not yet visible at its final path
///
/// Dropping it without calling `commit` deletes the partial file.
struct PendingOutput {
    partial: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PendingOutput {
    fn new(target: &Path) -> Result<Self, EpubError> {
        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{}' is not a file path", target.display()),
                )
            })?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            partial: target.with_file_name(format!(".{}.{}.part", file_name, local_time())),
            target: target.to_path_buf(),
            committed: false,
        })
    }

    fn commit(mut self) -> Result<(), EpubError> {
        fs::rename(&self.partial, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingOutput {
    fn drop(&mut self) {
        if self.committed || !self.partial.exists() {
            return;
        }

        if let Err(err) = fs::remove_file(&self.partial) {
            warn!("{}", err);
        }
    }
}

/// Write the artifacts into a staging directory and package them at `output_path`
///
/// Nothing appears at `output_path` unless every step succeeds.
///
/// ## Parameters
/// - `staging_root`: Directory in which the staging directory is created,
///   the system temporary directory when `None`
/// - `artifacts`: Every file of the package, including the `mimetype` marker
/// - `output_path`: Path of the container file to create
pub(crate) fn package(
    staging_root: Option<&Path>,
    artifacts: &[Artifact],
    output_path: &Path,
) -> Result<(), EpubError> {
    let staging = StagingDir::create(staging_root)?;
    stage(staging.path(), artifacts)?;

    let pending = PendingOutput::new(output_path)?;
    let entries = write_archive(staging.path(), &pending.partial)?;
    pending.commit()?;

    info!(
        "packaged {} entries into '{}'",
        entries,
        output_path.display()
    );
    Ok(())
}

/// Write every artifact below `staging`
fn stage(staging: &Path, artifacts: &[Artifact]) -> Result<(), EpubError> {
    for artifact in artifacts {
        let relative = Path::new(&artifact.path);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(RenderError::InvalidArtifactPath {
                path: artifact.path.clone(),
            }
            .into());
        }

        let target = staging.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, &artifact.data)?;
    }

    Ok(())
}

/// Serialize the staging tree into a zip container
///
/// Returns the number of entries written.
fn write_archive(staging: &Path, target: &Path) -> Result<usize, EpubError> {
    let file = File::create(target)?;
    let mut zip = ZipWriter::new(file);

    let stored = FileOptions::<()>::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    // The marker must be the first physical entry, before anything the walk finds.
    zip.start_file(MIMETYPE_FILE, stored)?;
    zip.write_all(&fs::read(staging.join(MIMETYPE_FILE))?)?;
    let mut entries = 1;

    for entry in WalkDir::new(staging).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();

        let relative_path = path
            .strip_prefix(staging)
            .map_err(|_| RenderError::InvalidArtifactPath {
                path: path.to_string_lossy().to_string(),
            })?;
        if relative_path == Path::new(MIMETYPE_FILE) {
            continue;
        }
        let target_path = relative_path.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            zip.add_directory(target_path, deflated)?;
        } else {
            zip.start_file(target_path, deflated)?;
            io::copy(&mut File::open(path)?, &mut zip)?;
        }
        entries += 1;
    }

    let file = zip.finish()?;
    file.sync_all()?;

    Ok(entries)
}
