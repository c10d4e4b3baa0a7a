//! Zip handling. Mod jars and version jars are unpacked into the job's
//! working directory, and finished working trees are packed back into a zip.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};

use walkdir::WalkDir;
use zip::read::ZipArchive;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive IO failed: {0}")]
    Io(#[from] io::Error),

    #[error("not a readable zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive does not exist: {0}")]
    NotFound(String),

    #[error("entry escapes the extraction directory: {0}")]
    UnsafeEntry(String),

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Zip containers accepted as input; told apart by extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Jar,
    Zip,
}

impl ArchiveType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("jar") {
            Some(ArchiveType::Jar)
        } else if ext.eq_ignore_ascii_case("zip") {
            Some(ArchiveType::Zip)
        } else {
            None
        }
    }
}

pub fn is_archive_file(path: &Path) -> bool {
    detect_archive_type(path).is_some()
}

pub fn detect_archive_type(path: &Path) -> Option<ArchiveType> {
    let ext = path.extension()?.to_str()?;
    ArchiveType::from_extension(ext)
}

/// Extracts every entry of `archive_path` below `dest`, preserving relative
/// paths. Returns the number of files written.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> ArchiveResult<usize> {
    if !archive_path.is_file() {
        return Err(ArchiveError::NotFound(archive_path.display().to_string()));
    }

    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    fs::create_dir_all(dest)?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }

    Ok(extracted)
}

/// Packs the contents of `source_dir` (not the directory itself) into a new
/// zip file at `output_path`. Entries are written in file-name order so the
/// same tree always yields the same archive.
pub fn pack_directory(source_dir: &Path, output_path: &Path) -> ArchiveResult<usize> {
    let mut writer = ZipWriter::new(File::create(output_path)?);

    let options = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let dir_options = FileOptions::<()>::default().unix_permissions(0o755);

    let mut written = 0;
    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|_| ArchiveError::UnsafeEntry(entry.path().display().to_string()))?;
        let name = entry_name(relative);

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{name}/"), dir_options.clone())?;
            continue;
        }

        writer.start_file(name, options.clone())?;
        let mut input = File::open(entry.path())?;
        io::copy(&mut input, &mut writer)?;
        written += 1;
    }

    writer.finish()?;
    Ok(written)
}

/// Zip entry names always use forward slashes, whatever the host separator.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
