use std::fs;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{debug, info};
use walkdir::WalkDir;
use zip::{write::FileOptions, ZipWriter};

use crate::constants::{
    ARCHIVE_EXTENSION, ARCHIVE_PREFIX, ARCHIVE_TIMESTAMP_FORMAT, COMPRESSED_EXTENSIONS,
    COMPRESSION_CHUNK_SIZE as CHUNK_SIZE, LARGE_FILE_COMPRESSION_THRESHOLD,
};
use crate::models::HostIdentity;

/// Entries at or above this size need the zip64 extension.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Determine the compression options for a file.
///
/// Already compressed files and files above the large-file threshold use the
/// fastest level. Everything else, including perf data, uses level 6. Files of
/// 4 GiB or more are written as zip64 entries.
pub fn get_compression_options(path: &Path) -> FileOptions {
    let low_compression = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => COMPRESSED_EXTENSIONS.contains(&ext),
        _ => false,
    };

    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let large_file = file_size > LARGE_FILE_COMPRESSION_THRESHOLD;

    let level = if low_compression || large_file { 1 } else { 6 };
    FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(level))
        .unix_permissions(0o644)
        .large_file(file_size >= ZIP64_THRESHOLD)
}

/// Map anything outside `[A-Za-z0-9._-]` to `_` so an identifier cannot
/// introduce a path separator into the archive name.
fn file_name_component(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect()
}

/// `perf-<cid>-<aid>-<YYYYMMDD>-<HHMMSS>.zip`
pub fn archive_name(identity: &HostIdentity, timestamp: &DateTime<Local>) -> String {
    format!(
        "{}-{}-{}-{}.{}",
        ARCHIVE_PREFIX,
        file_name_component(&identity.cid),
        file_name_component(&identity.aid),
        timestamp.format(ARCHIVE_TIMESTAMP_FORMAT),
        ARCHIVE_EXTENSION
    )
}

/// Write every regular file under `source_dir` into a new zip at `zip_path`.
///
/// Entry names are relative to `source_dir` with `/` separators. If the zip
/// itself lies inside `source_dir` it is skipped. Returns the number of files
/// written.
///
/// The zip is assembled under a `.partial` name and only renamed into place
/// once it is complete; on failure nothing is left at either path.
pub fn compress_directory(source_dir: &Path, zip_path: &Path) -> Result<usize> {
    let mut partial = zip_path.as_os_str().to_owned();
    partial.push(".partial");
    let partial_path = PathBuf::from(partial);

    let written = write_zip(source_dir, &partial_path, &[zip_path, &partial_path]).and_then(|count| {
        fs::rename(&partial_path, zip_path)
            .with_context(|| format!("Failed to move archive into place at {}", zip_path.display()))?;
        Ok(count)
    });

    if written.is_err() && partial_path.exists() {
        if let Err(e) = fs::remove_file(&partial_path) {
            debug!("Unable to remove {}: {}", partial_path.display(), e);
        }
    }
    written
}

fn write_zip(source_dir: &Path, zip_path: &Path, skip: &[&Path]) -> Result<usize> {
    let zip_file = fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file {}", zip_path.display()))?;
    let mut zip = ZipWriter::new(zip_file);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut count = 0;

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", source_dir.display()))?;
        let path = entry.path();

        if skip.contains(&path) {
            continue;
        }

        let rel_path = match path.strip_prefix(source_dir) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let rel_name = rel_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(rel_name.clone(), FileOptions::default())
                .with_context(|| format!("Failed to add directory {}", rel_name))?;
            continue;
        }
        if !entry.file_type().is_file() {
            debug!("Skipping non-regular file {}", path.display());
            continue;
        }

        let start = Instant::now();
        let file = fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        zip.start_file(rel_name.clone(), get_compression_options(path))
            .with_context(|| format!("Failed to start file entry for {}", rel_name))?;

        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .with_context(|| format!("Failed to read from {}", path.display()))?;
            if bytes_read == 0 {
                break;
            }
            zip.write_all(&buffer[..bytes_read])
                .with_context(|| format!("Failed to write to zip for {}", rel_name))?;
        }

        debug!("Compressed {} ({} bytes) in {:?}", rel_name, file_size, start.elapsed());
        count += 1;
    }

    zip.finish().context("Failed to finalize zip file")?;
    Ok(count)
}

/// Package the working directory into the named archive under `output_dir`.
pub fn create_archive(work_dir: &Path, output_dir: &Path, identity: &HostIdentity) -> Result<PathBuf> {
    let start = Instant::now();

    if !work_dir.is_dir() {
        anyhow::bail!("Working directory {} does not exist", work_dir.display());
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let zip_path = output_dir.join(archive_name(identity, &Local::now()));
    info!("Archiving {} to {}", work_dir.display(), zip_path.display());

    let count = compress_directory(work_dir, &zip_path)?;

    info!("Archived {} files in {:?}", count, start.elapsed());
    Ok(zip_path)
}
