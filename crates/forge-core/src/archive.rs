//! Delivery packager
//!
//! Bundles every file in a run workspace into one flattened zip archive.
//! The archive never contains itself, a prior archive is replaced, and an
//! empty workspace still yields a valid (empty) archive.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Default archive file name
pub const DEFAULT_ARCHIVE_NAME: &str = "final_delivery.zip";

/// Package `dir` into `dir/<archive_name>`.
///
/// Files are flattened to their file names (no directory prefixes); when two
/// files at different depths share a name, the lexicographically later path
/// wins. Any file named like the archive is excluded at any depth.
///
/// # Errors
/// Returns `Error::Packaging` on any I/O failure.
pub fn package(dir: &Path, archive_name: &str) -> Result<PathBuf> {
    let zip_path = dir.join(archive_name);

    // Last-write-wins: a prior archive is replaced, its absence is fine.
    if zip_path.exists() {
        std::fs::remove_file(&zip_path).map_err(|e| {
            Error::Packaging(format!("failed to remove {}: {e}", zip_path.display()))
        })?;
    }

    let mut entries = BTreeMap::new();
    collect_files(dir, archive_name, &mut entries)?;

    let file = std::fs::File::create(&zip_path)
        .map_err(|e| Error::Packaging(format!("failed to create {}: {e}", zip_path.display())))?;
    let mut writer = ZipWriter::new(file);

    for (name, path) in &entries {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Packaging(format!("failed to read {}: {e}", path.display())))?;
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| Error::Packaging(format!("failed to add entry '{name}': {e}")))?;
        writer
            .write_all(&bytes)
            .map_err(|e| Error::Packaging(format!("failed to write entry '{name}': {e}")))?;
        debug!(entry = %name, bytes = bytes.len(), "Archived file");
    }

    writer
        .finish()
        .map_err(|e| Error::Packaging(format!("failed to finish archive: {e}")))?;

    info!(archive = %zip_path.display(), entries = entries.len(), "Created delivery archive");
    Ok(zip_path)
}

/// Walk `dir` recursively, mapping flattened entry names to source paths.
fn collect_files(
    dir: &Path,
    archive_name: &str,
    entries: &mut BTreeMap<String, PathBuf>,
) -> Result<()> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| Error::Packaging(format!("failed to read {}: {e}", dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            collect_files(&path, archive_name, entries)?;
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name == archive_name {
                continue;
            }
            entries.insert(name.to_string(), path);
        }
    }
    Ok(())
}
