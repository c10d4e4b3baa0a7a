//! Finds the language resources inside a mod archive or a game-version
//! directory.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::archive::{self, detect_archive_type, ArchiveError, ArchiveType};
use crate::TARGET_LANG_PREFIX;

const FABRIC_MANIFEST: &str = "fabric.mod.json";
const FORGE_METADATA: &str = "META-INF/mods.toml";
const NEOFORGE_METADATA: &str = "META-INF/neoforge.mods.toml";
const LANG_DIR_NAME: &str = "lang";
const LANG_FILE_EXTENSION: &str = ".json";

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("invalid package: {0}")]
    InvalidPackage(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Mod loader layout convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModVariant {
    Fabric,
    Forge,
    NeoForge,
}

impl ModVariant {
    pub fn label(&self) -> &'static str {
        match self {
            ModVariant::Fabric => "fabric",
            ModVariant::Forge => "forge",
            ModVariant::NeoForge => "neoforge",
        }
    }
}

impl fmt::Display for ModVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModVariant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fabric" => Ok(ModVariant::Fabric),
            "forge" => Ok(ModVariant::Forge),
            "neoforge" => Ok(ModVariant::NeoForge),
            other => Err(format!("unknown mod variant: {other}")),
        }
    }
}

/// Layout tag of a located bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    Mod(ModVariant),
    GameVersion,
}

/// One source-language file discovered inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageFile {
    pub path: PathBuf,
    /// Path relative to the owning bundle's root.
    pub relative_path: PathBuf,
}

impl LanguageFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ResourceBundle {
    /// Extraction root for mods, the `assets` directory for game versions.
    pub root: PathBuf,
    pub kind: BundleKind,
    pub language_files: Vec<LanguageFile>,
}

/// Probes an extracted mod for its loader. Fabric's manifest wins; a
/// `mods.toml` mentioning NeoForge means NeoForge; everything else is Forge.
pub fn detect_variant(extract_dir: &Path) -> ModVariant {
    if extract_dir.join(FABRIC_MANIFEST).is_file() {
        return ModVariant::Fabric;
    }

    if extract_dir.join(NEOFORGE_METADATA).is_file() {
        return ModVariant::NeoForge;
    }

    let mods_toml = extract_dir.join(FORGE_METADATA);
    if mods_toml.is_file() {
        let content = fs::read(&mods_toml)
            .map(|bytes| String::from_utf8_lossy(&bytes).to_lowercase())
            .unwrap_or_default();
        if content.contains("neoforge") {
            return ModVariant::NeoForge;
        }
    }

    ModVariant::Forge
}

/// Extracts `archive_path` into `extract_dir` and collects its language files.
/// An explicit `variant` skips detection.
pub fn locate_mod(
    archive_path: &Path,
    extract_dir: &Path,
    variant: Option<ModVariant>,
) -> Result<ResourceBundle, LocatorError> {
    let count = archive::extract_archive(archive_path, extract_dir)?;
    debug!(
        "extracted {count} entries from {} into {}",
        archive_path.display(),
        extract_dir.display()
    );

    let variant = variant.unwrap_or_else(|| detect_variant(extract_dir));
    let assets = extract_dir.join("assets");
    let language_files = if assets.is_dir() {
        find_lang_files(&assets, extract_dir)?
    } else {
        Vec::new()
    };

    Ok(ResourceBundle {
        root: extract_dir.to_path_buf(),
        kind: BundleKind::Mod(variant),
        language_files,
    })
}

/// Locates the game's language files below `version_dir`. The bundle root is
/// the resolved `assets` directory, and file paths are relative to it.
pub fn locate_game_version(version_dir: &Path, work_dir: &Path) -> Result<ResourceBundle, LocatorError> {
    let assets = locate_game_assets(version_dir, work_dir)?;
    let language_files = find_lang_files(&assets, &assets)?;

    Ok(ResourceBundle {
        root: assets,
        kind: BundleKind::GameVersion,
        language_files,
    })
}

/// Resolves the `assets` directory of a game-version directory. When the
/// directory has no `assets/`, its single top-level jar is extracted into
/// `work_dir` and that jar's `assets/` is used instead.
pub fn locate_game_assets(version_dir: &Path, work_dir: &Path) -> Result<PathBuf, LocatorError> {
    let assets = version_dir.join("assets");
    if assets.is_dir() {
        return Ok(assets);
    }

    if !version_dir.is_dir() {
        return Err(LocatorError::InvalidPackage(format!(
            "{} is not a directory",
            version_dir.display()
        )));
    }

    let mut jars = Vec::new();
    for entry in fs::read_dir(version_dir)? {
        let path = entry?.path();
        if path.is_file() && detect_archive_type(&path) == Some(ArchiveType::Jar) {
            jars.push(path);
        }
    }

    let jar = match jars.as_slice() {
        [single] => single.clone(),
        [] => {
            return Err(LocatorError::InvalidPackage(format!(
                "{} has no assets directory and no version jar",
                version_dir.display()
            )))
        }
        _ => {
            return Err(LocatorError::InvalidPackage(format!(
                "{} has no assets directory and {} jar files; expected exactly one",
                version_dir.display(),
                jars.len()
            )))
        }
    };

    let jar_dir = work_dir.join("jar_extracted");
    info!("extracting assets from {}", jar.display());
    archive::extract_archive(&jar, &jar_dir)?;

    let extracted_assets = jar_dir.join("assets");
    if extracted_assets.is_dir() {
        Ok(extracted_assets)
    } else {
        Err(LocatorError::InvalidPackage(format!(
            "{} contains no assets directory",
            jar.display()
        )))
    }
}

/// Walks `search_root` for `*.json` files inside directories named `lang`,
/// skipping files that already carry the target-language prefix. Paths are
/// reported relative to `relative_to`, in file-name order.
pub fn find_lang_files(
    search_root: &Path,
    relative_to: &Path,
) -> Result<Vec<LanguageFile>, LocatorError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(search_root).sort_by_file_name() {
        let entry = entry.map_err(|err| LocatorError::Io(err.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let in_lang_dir = path
            .parent()
            .and_then(|parent| parent.file_name())
            .is_some_and(|name| name == LANG_DIR_NAME);
        if !in_lang_dir {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(LANG_FILE_EXTENSION) || name.starts_with(TARGET_LANG_PREFIX) {
            continue;
        }

        let relative_path = path
            .strip_prefix(relative_to)
            .unwrap_or(path)
            .to_path_buf();
        files.push(LanguageFile {
            path: path.to_path_buf(),
            relative_path,
        });
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::{FileOptions, ZipWriter};

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn write_jar(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(fs::File::create(path).unwrap());
        for (name, content) in entries {
            writer
                .start_file(*name, FileOptions::<()>::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn detects_fabric_before_forge_metadata() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("fabric.mod.json"), "{}");
        touch(&dir.path().join("META-INF/mods.toml"), "modLoader=\"javafml\"");
        assert_eq!(detect_variant(dir.path()), ModVariant::Fabric);
    }

    #[test]
    fn distinguishes_neoforge_from_forge_by_mods_toml() {
        let neo = tempdir().unwrap();
        touch(
            &neo.path().join("META-INF/mods.toml"),
            "[[dependencies.demo]]\nmodId=\"NeoForge\"",
        );
        assert_eq!(detect_variant(neo.path()), ModVariant::NeoForge);

        let forge = tempdir().unwrap();
        touch(&forge.path().join("META-INF/mods.toml"), "modId=\"forge\"");
        assert_eq!(detect_variant(forge.path()), ModVariant::Forge);
    }

    #[test]
    fn defaults_to_forge_without_metadata() {
        let dir = tempdir().unwrap();
        assert_eq!(detect_variant(dir.path()), ModVariant::Forge);
    }

    #[test]
    fn parses_variant_names() {
        assert_eq!("NeoForge".parse::<ModVariant>().unwrap(), ModVariant::NeoForge);
        assert!("quilt".parse::<ModVariant>().is_err());
    }

    #[test]
    fn finds_only_source_lang_files() {
        let dir = tempdir().unwrap();
        let assets = dir.path().join("assets");
        touch(&assets.join("demo/lang/en_us.json"), "{}");
        touch(&assets.join("demo/lang/zh_cn.json"), "{}");
        touch(&assets.join("demo/lang/readme.txt"), "");
        touch(&assets.join("demo/models/item.json"), "{}");
        touch(&assets.join("other/lang/de_de.json"), "{}");

        let files = find_lang_files(&assets, dir.path()).unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|file| file.relative_path.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            relative,
            vec!["assets/demo/lang/en_us.json", "assets/other/lang/de_de.json"]
        );
    }

    #[test]
    fn explicit_variant_skips_probing() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("demo.jar");
        write_jar(
            &jar,
            &[
                ("fabric.mod.json", "{}"),
                ("assets/demo/lang/en_us.json", "{}"),
            ],
        );

        let bundle = locate_mod(&jar, &dir.path().join("x"), Some(ModVariant::Forge)).unwrap();
        assert_eq!(bundle.kind, BundleKind::Mod(ModVariant::Forge));
        assert_eq!(bundle.language_files.len(), 1);
    }

    #[test]
    fn prefers_native_assets_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("1.20/assets")).unwrap();
        let work = tempdir().unwrap();
        let assets = locate_game_assets(&dir.path().join("1.20"), work.path()).unwrap();
        assert_eq!(assets, dir.path().join("1.20/assets"));
    }

    #[test]
    fn extracts_assets_from_single_version_jar() {
        let dir = tempdir().unwrap();
        let version = dir.path().join("1.20.1");
        fs::create_dir_all(&version).unwrap();
        write_jar(
            &version.join("1.20.1.jar"),
            &[("assets/minecraft/lang/en_us.json", r#"{"block.stone": "Stone"}"#)],
        );
        fs::write(version.join("1.20.1.json"), "{}").unwrap();

        let work = tempdir().unwrap();
        let assets = locate_game_assets(&version, work.path()).unwrap();
        assert!(assets.starts_with(work.path()));
        assert!(assets.join("minecraft/lang/en_us.json").is_file());
    }

    #[test]
    fn game_version_bundle_is_rooted_at_assets() {
        let dir = tempdir().unwrap();
        let version = dir.path().join("1.20.1");
        fs::create_dir_all(&version).unwrap();
        write_jar(
            &version.join("1.20.1.jar"),
            &[
                ("assets/minecraft/lang/en_us.json", "{}"),
                ("assets/minecraft/lang/zh_cn.json", "{}"),
            ],
        );

        let work = tempdir().unwrap();
        let bundle = locate_game_version(&version, work.path()).unwrap();

        assert_eq!(bundle.kind, BundleKind::GameVersion);
        assert!(bundle.root.starts_with(work.path()));
        assert!(bundle.root.ends_with("assets"));
        assert_eq!(bundle.language_files.len(), 1);
        assert_eq!(
            bundle.language_files[0].relative_path,
            Path::new("minecraft").join("lang").join("en_us.json")
        );
    }

    #[test]
    fn rejects_directory_without_assets_or_jar() {
        let dir = tempdir().unwrap();
        let work = tempdir().unwrap();
        let err = locate_game_assets(dir.path(), work.path()).unwrap_err();
        assert!(matches!(err, LocatorError::InvalidPackage(_)));
    }

    #[test]
    fn rejects_ambiguous_jars() {
        let dir = tempdir().unwrap();
        write_jar(&dir.path().join("a.jar"), &[("assets/x.txt", "")]);
        write_jar(&dir.path().join("b.jar"), &[("assets/x.txt", "")]);
        let work = tempdir().unwrap();
        let err = locate_game_assets(dir.path(), work.path()).unwrap_err();
        assert!(matches!(err, LocatorError::InvalidPackage(_)));
    }
}
