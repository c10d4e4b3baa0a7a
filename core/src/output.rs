//! Language file IO, output naming and resource-pack metadata.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{json, Map, Value};

use crate::archive::{self, ArchiveError};
use crate::locator::LanguageFile;
use crate::TARGET_LANG_CODE;

/// Resource-pack format written into `pack.mcmeta`.
pub const PACK_FORMAT: u32 = 9;
pub const PACK_DESCRIPTION: &str = "§6AI自动汉化资源包\n§7由Minecraft翻译器生成";
pub const DEFAULT_MOD_SUFFIX: &str = "汉化版";
pub const DEFAULT_PACK_LABEL: &str = "汉化资源包";

/// Target file for a mod language file, in the same directory.
/// `en_us.json` becomes `zh_cn.json`; a name without an underscore gets the
/// code as a prefix (`lang.json` -> `zh_cn_lang.json`).
pub fn mod_lang_target_path(source: &Path) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let target_name = if file_name.contains('_') {
        format!("{TARGET_LANG_CODE}.json")
    } else {
        format!("{TARGET_LANG_CODE}_{file_name}")
    };
    source.with_file_name(target_name)
}

/// Source kept when several files of one `lang` directory share a target.
pub const PREFERRED_SOURCE_FILE: &str = "en_us.json";

/// Keeps one source per mod target file, in discovery order. `en_us.json`
/// wins a shared target; otherwise the first file found does.
pub fn select_mod_sources(files: &[LanguageFile]) -> Vec<LanguageFile> {
    let mut chosen: Vec<(PathBuf, &LanguageFile)> = Vec::new();

    for file in files {
        let target = mod_lang_target_path(&file.path);
        let Some(slot) = chosen.iter_mut().find(|(existing, _)| *existing == target) else {
            chosen.push((target, file));
            continue;
        };

        let (kept, ignored) = if file.file_name() == PREFERRED_SOURCE_FILE {
            (file, slot.1)
        } else {
            (slot.1, file)
        };
        warn!(
            "{} and {} both translate to {}; using {}",
            ignored.relative_path.display(),
            kept.relative_path.display(),
            target.display(),
            kept.file_name()
        );
        slot.1 = kept;
    }

    chosen.into_iter().map(|(_, file)| file.clone()).collect()
}

/// Target file for a game language file: the path relative to `assets/`,
/// mirrored under the pack's `assets/`, with `.json` replaced by
/// `_zh_cn.json`.
pub fn game_lang_target_path(pack_dir: &Path, relative: &Path) -> PathBuf {
    let mut target = pack_dir.join("assets").join(relative);
    let file_name = relative
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.strip_suffix(".json").unwrap_or(&file_name);
    target.set_file_name(format!("{stem}_{TARGET_LANG_CODE}.json"));
    target
}

/// `<stem>_<suffix>_<timestamp><ext>` beside the input archive.
pub fn mod_output_path(input: &Path, suffix: &str, timestamp: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mod".into());
    let extension = input
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    input.with_file_name(format!("{stem}_{suffix}_{timestamp}{extension}"))
}

/// `<label>_<version-dir-name>_<timestamp>.zip` beside the version directory.
pub fn game_output_path(version_dir: &Path, label: &str, timestamp: &str) -> PathBuf {
    let version = version_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "minecraft".into());
    let parent = version_dir.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{label}_{version}_{timestamp}.zip"))
}

/// Writes `pack.mcmeta` and creates the (possibly empty) `assets/` directory.
pub fn write_pack_metadata(pack_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(pack_dir.join("assets"))?;
    let metadata = json!({
        "pack": {
            "pack_format": PACK_FORMAT,
            "description": PACK_DESCRIPTION,
        }
    });
    write_json(&pack_dir.join("pack.mcmeta"), &metadata)
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Reads a language file as text. A UTF-8 byte-order mark is dropped and
/// invalid sequences are replaced rather than rejected.
pub fn read_lang_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
    Ok(String::from_utf8_lossy(content).into_owned())
}

/// Writes a language map as UTF-8 JSON with four-space indentation and
/// unescaped non-ASCII text.
pub fn write_lang_file(path: &Path, entries: &Map<String, Value>) -> io::Result<()> {
    write_json(path, entries)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer).map_err(io::Error::other)?;

    let mut file = File::create(path)?;
    file.write_all(&buffer)?;
    Ok(())
}

/// Packs `source_dir` into `output` through a sibling temporary file, so the
/// final path only ever holds a complete archive.
pub fn write_archive_atomically(source_dir: &Path, output: &Path) -> Result<usize, ArchiveError> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = build_temp_path(output);
    let written = match archive::pack_directory(source_dir, &temp_path) {
        Ok(written) => written,
        Err(err) => {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
    };

    if let Err(err) = fs::rename(&temp_path, output) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(written)
}

fn build_temp_path(target: &Path) -> PathBuf {
    let suffix = format!(".part{}", std::process::id());
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(suffix);
    target.with_file_name(name)
}
