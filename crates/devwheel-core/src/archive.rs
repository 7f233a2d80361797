//! Zip serialization of a staged wheel tree.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::debug;
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::effects::ArchiveWriter;

/// 1980-01-01T00:00:00Z, the earliest instant a zip header can encode.
const ZIP_EPOCH: i64 = 315_532_800;

/// Writes wheels with a regenerated `RECORD`, `.dist-info` entries last.
pub struct WheelArchiveWriter {
    source_date_epoch: Option<i64>,
}

impl WheelArchiveWriter {
    pub fn new(source_date_epoch: Option<i64>) -> Self {
        Self { source_date_epoch }
    }
}

struct StagedFile {
    path: PathBuf,
    archive_name: String,
}

impl ArchiveWriter for WheelArchiveWriter {
    fn write_archive(&self, staging_dir: &Path, archive_path: &Path) -> Result<()> {
        let dist_info = find_dist_info(staging_dir)?;
        let record_name = format!("{dist_info}/RECORD");
        let dist_info_prefix = format!("{dist_info}/");

        let mut payload = Vec::new();
        let mut metadata = Vec::new();
        for entry in WalkDir::new(staging_dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", staging_dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(staging_dir)?;
            let archive_name = archive_path_str(relative);
            if archive_name == record_name {
                continue;
            }
            let staged = StagedFile {
                path: entry.path().to_path_buf(),
                archive_name,
            };
            if staged.archive_name.starts_with(&dist_info_prefix) {
                metadata.push(staged);
            } else {
                payload.push(staged);
            }
        }
        payload.sort_by(|a, b| a.archive_name.cmp(&b.archive_name));
        metadata.sort_by(|a, b| a.archive_name.cmp(&b.archive_name));

        let parent = archive_path
            .parent()
            .ok_or_else(|| anyhow!("archive path {} has no parent", archive_path.display()))?;
        let mut temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temporary archive in {}", parent.display()))?;
        {
            let mut zip = ZipWriter::new(temp.as_file_mut());
            let mut records = Vec::new();
            for staged in payload.iter().chain(metadata.iter()) {
                let data = fs::read(&staged.path)
                    .with_context(|| format!("reading {}", staged.path.display()))?;
                zip.start_file(staged.archive_name.clone(), self.file_options(&staged.path)?)?;
                zip.write_all(&data)?;
                records.push(record_row(&staged.archive_name, &data));
            }
            records.push([record_name.clone(), String::new(), String::new()]);
            let record_body = render_record(&records)?;
            zip.start_file(
                record_name,
                base_options(self.source_date_epoch.unwrap_or(ZIP_EPOCH)),
            )?;
            zip.write_all(&record_body)?;
            zip.finish()?;
        }
        temp.persist(archive_path)
            .map_err(|err| err.error)
            .with_context(|| format!("writing {}", archive_path.display()))?;
        debug!(
            archive = %archive_path.display(),
            files = payload.len() + metadata.len(),
            "wrote wheel archive"
        );
        Ok(())
    }
}

impl WheelArchiveWriter {
    fn file_options(&self, path: &Path) -> Result<FileOptions> {
        let meta = fs::metadata(path).with_context(|| format!("metadata for {}", path.display()))?;
        let seconds = match self.source_date_epoch {
            Some(epoch) => epoch,
            None => meta
                .modified()
                .ok()
                .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
                .and_then(|elapsed| i64::try_from(elapsed.as_secs()).ok())
                .unwrap_or(ZIP_EPOCH),
        };
        Ok(base_options(seconds).unix_permissions(file_mode(&meta)))
    }
}

fn base_options(unix_seconds: i64) -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip_timestamp(unix_seconds))
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    0o644
}

fn zip_timestamp(unix_seconds: i64) -> zip::DateTime {
    let Ok(moment) = OffsetDateTime::from_unix_timestamp(unix_seconds.max(ZIP_EPOCH)) else {
        return zip::DateTime::default();
    };
    let Ok(year) = u16::try_from(moment.year()) else {
        return zip::DateTime::default();
    };
    zip::DateTime::from_date_and_time(
        year,
        u8::from(moment.month()),
        moment.day(),
        moment.hour(),
        moment.minute(),
        moment.second(),
    )
    .unwrap_or_default()
}

/// The single top-level `*.dist-info` directory of a staged wheel.
fn find_dist_info(staging_dir: &Path) -> Result<String> {
    let mut found = Vec::new();
    for entry in fs::read_dir(staging_dir)
        .with_context(|| format!("reading dir {}", staging_dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".dist-info") {
            found.push(name);
        }
    }
    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(anyhow!(
            "no .dist-info directory found in {}",
            staging_dir.display()
        )),
        _ => Err(anyhow!(
            "multiple .dist-info directories found in {}: {}",
            staging_dir.display(),
            found.join(", ")
        )),
    }
}

fn archive_path_str(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn record_row(path: &str, data: &[u8]) -> [String; 3] {
    let digest = Sha256::digest(data);
    [
        path.to_string(),
        format!("sha256={}", URL_SAFE_NO_PAD.encode(digest)),
        data.len().to_string(),
    ]
}

fn render_record(rows: &[[String; 3]]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|err| anyhow!("rendering RECORD: {}", err.error()))
}

/// Reads a produced wheel back; shared by the tests of this crate.
#[cfg(test)]
pub(crate) fn read_archive(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(fs::File::open(path)?)?;
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let mut body = Vec::new();
        file.read_to_end(&mut body)?;
        entries.push((file.name().to_string(), body));
    }
    Ok(entries)
}
