//! The two invocations: translate a mod archive, or build a resource pack
//! for a game-version directory. Each owns one scoped working directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::TempDir;
use thiserror::Error;

use crate::ai::{CompletionEndpoint, TranslationError};
use crate::archive::ArchiveError;
use crate::batch::DEFAULT_BATCH_SIZE;
use crate::filter::{GameOptions, ModOptions, TranslateOptions};
use crate::job::CancelFlag;
use crate::locator::{self, LanguageFile, LocatorError, ModVariant};
use crate::output::{self, DEFAULT_MOD_SUFFIX, DEFAULT_PACK_LABEL};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::time::current_output_timestamp;
use crate::translate::{FileOutcome, FileTranslator, TranslateError};

const WORK_DIR_PREFIX: &str = "minecraft_translator_";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid package: {0}")]
    InvalidPackage(String),

    #[error("no translatable language files found in {0}")]
    NoLanguageFiles(String),

    #[error("translation API error: {0}")]
    TranslationApi(TranslationError),

    #[error("translation cancelled")]
    Cancelled,

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("failed to write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("job worker is not running")]
    WorkerUnavailable,
}

impl From<LocatorError> for PipelineError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::InvalidPackage(message) => PipelineError::InvalidPackage(message),
            LocatorError::Archive(err) => PipelineError::Archive(err),
            LocatorError::Io(err) => PipelineError::Io(err),
        }
    }
}

impl From<TranslateError> for PipelineError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::Api(err) => PipelineError::TranslationApi(err),
            TranslateError::Cancelled => PipelineError::Cancelled,
            TranslateError::Write { path, source } => PipelineError::Output { path, source },
        }
    }
}

/// Per-invocation settings that are not endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    pub batch_size: usize,
    /// Where the scoped working directory is created; the system temp dir
    /// when unset.
    pub work_root: Option<PathBuf>,
    /// Inserted into translated mod file names.
    pub mod_suffix: String,
    /// Leading part of resource-pack file names.
    pub pack_label: String,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            work_root: None,
            mod_suffix: DEFAULT_MOD_SUFFIX.into(),
            pack_label: DEFAULT_PACK_LABEL.into(),
        }
    }
}

/// Collaborators threaded through one invocation.
#[derive(Clone, Copy)]
pub struct JobContext<'a> {
    pub endpoint: &'a dyn CompletionEndpoint,
    pub sink: &'a dyn ProgressSink,
    pub cancel: &'a CancelFlag,
    pub settings: &'a JobSettings,
}

#[derive(Debug, Clone)]
pub enum JobKind {
    Mod {
        archive: PathBuf,
        /// Skips layout detection when set.
        variant: Option<ModVariant>,
        options: ModOptions,
    },
    GameVersion {
        directory: PathBuf,
        options: GameOptions,
    },
}

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub kind: JobKind,
    pub settings: JobSettings,
}

impl JobRequest {
    pub async fn run(
        &self,
        endpoint: &dyn CompletionEndpoint,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<PathBuf, PipelineError> {
        let ctx = JobContext {
            endpoint,
            sink,
            cancel,
            settings: &self.settings,
        };
        match &self.kind {
            JobKind::Mod {
                archive,
                variant,
                options,
            } => translate_mod(ctx, archive, *variant, *options).await,
            JobKind::GameVersion { directory, options } => {
                translate_game_version(ctx, directory, *options).await
            }
        }
    }
}

/// Translates the language files of a mod archive and writes a new archive
/// beside it. Returns the path of the new archive.
pub async fn translate_mod(
    ctx: JobContext<'_>,
    archive: &Path,
    variant: Option<ModVariant>,
    options: ModOptions,
) -> Result<PathBuf, PipelineError> {
    let mut reporter = ProgressReporter::new(ctx.sink);
    let work_dir = create_work_dir(ctx.settings)?;
    reporter.update(5.0, "created working directory");

    let result = run_mod(ctx, &mut reporter, work_dir.path(), archive, variant, options).await;
    finish(&mut reporter, work_dir);
    result
}

async fn run_mod(
    ctx: JobContext<'_>,
    reporter: &mut ProgressReporter<'_>,
    work_dir: &Path,
    archive: &Path,
    variant: Option<ModVariant>,
    options: ModOptions,
) -> Result<PathBuf, PipelineError> {
    if !archive.is_file() {
        return Err(PipelineError::InvalidPackage(format!(
            "{} is not a file",
            archive.display()
        )));
    }

    let extract_dir = work_dir.join("extracted");
    reporter.update(10.0, format!("extracting {}", display_name(archive)));
    let bundle = locator::locate_mod(archive, &extract_dir, variant)?;
    if let locator::BundleKind::Mod(variant) = bundle.kind {
        reporter.update(15.0, format!("mod variant: {variant}"));
    }

    reporter.update(20.0, "searching language files");
    if bundle.language_files.is_empty() {
        return Err(PipelineError::NoLanguageFiles(archive.display().to_string()));
    }
    let sources = output::select_mod_sources(&bundle.language_files);
    reporter.update(25.0, format!("found {} language files", sources.len()));

    let translator = FileTranslator {
        endpoint: ctx.endpoint,
        options: TranslateOptions::Mod(options),
        batch_size: ctx.settings.batch_size,
        cancel: ctx.cancel,
    };
    translate_files(
        &translator,
        reporter,
        &sources,
        (25.0, 50.0),
        |file| output::mod_lang_target_path(&file.path),
    )
    .await?;

    reporter.update(80.0, "packaging translated mod");
    let output_path = output::mod_output_path(
        archive,
        &ctx.settings.mod_suffix,
        &current_output_timestamp(),
    );
    output::write_archive_atomically(&bundle.root, &output_path)?;
    info!("wrote {}", output_path.display());
    reporter.update(95.0, format!("packaged {}", display_name(&output_path)));

    Ok(output_path)
}

/// Translates the game's language files into a resource pack written beside
/// `version_dir`. Returns the path of the pack.
pub async fn translate_game_version(
    ctx: JobContext<'_>,
    version_dir: &Path,
    options: GameOptions,
) -> Result<PathBuf, PipelineError> {
    let mut reporter = ProgressReporter::new(ctx.sink);
    let work_dir = create_work_dir(ctx.settings)?;
    reporter.update(5.0, "created working directory");

    let result = run_game_version(ctx, &mut reporter, work_dir.path(), version_dir, options).await;
    finish(&mut reporter, work_dir);
    result
}

async fn run_game_version(
    ctx: JobContext<'_>,
    reporter: &mut ProgressReporter<'_>,
    work_dir: &Path,
    version_dir: &Path,
    options: GameOptions,
) -> Result<PathBuf, PipelineError> {
    if !version_dir.is_dir() {
        return Err(PipelineError::InvalidPackage(format!(
            "{} is not a directory",
            version_dir.display()
        )));
    }

    reporter.update(10.0, "locating game assets");
    let bundle = locator::locate_game_version(version_dir, work_dir)?;
    debug!("reading game assets from {}", bundle.root.display());

    reporter.update(15.0, "searching language files");
    if bundle.language_files.is_empty() {
        return Err(PipelineError::NoLanguageFiles(version_dir.display().to_string()));
    }
    reporter.update(20.0, format!("found {} language files", bundle.language_files.len()));

    let pack_dir = work_dir.join("resource_pack");
    output::write_pack_metadata(&pack_dir)?;

    let translator = FileTranslator {
        endpoint: ctx.endpoint,
        options: TranslateOptions::Game(options),
        batch_size: ctx.settings.batch_size,
        cancel: ctx.cancel,
    };
    translate_files(
        &translator,
        reporter,
        &bundle.language_files,
        (20.0, 60.0),
        |file| output::game_lang_target_path(&pack_dir, &file.relative_path),
    )
    .await?;

    reporter.update(85.0, "packaging resource pack");
    let output_path = output::game_output_path(
        version_dir,
        &ctx.settings.pack_label,
        &current_output_timestamp(),
    );
    output::write_archive_atomically(&pack_dir, &output_path)?;
    info!("wrote {}", output_path.display());
    reporter.update(95.0, format!("packaged {}", display_name(&output_path)));

    Ok(output_path)
}

/// Translates `files` in discovery order, spreading progress over
/// `start..start + span`.
async fn translate_files<F>(
    translator: &FileTranslator<'_>,
    reporter: &mut ProgressReporter<'_>,
    files: &[LanguageFile],
    (start, span): (f32, f32),
    target_for: F,
) -> Result<(), PipelineError>
where
    F: Fn(&LanguageFile) -> PathBuf,
{
    let total = files.len();
    let mut skipped = 0usize;

    for (index, file) in files.iter().enumerate() {
        if translator.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let percent = start + (index as f32 / total as f32) * span;
        reporter.update(
            percent,
            format!("translating file ({}/{total}): {}", index + 1, file.file_name()),
        );

        let target = target_for(file);
        if translator.translate_file(&file.path, &target, reporter).await? == FileOutcome::Skipped {
            skipped += 1;
        }
    }

    if skipped > 0 {
        warn!("{skipped} of {total} language files were skipped");
    }
    Ok(())
}

fn create_work_dir(settings: &JobSettings) -> io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(WORK_DIR_PREFIX);
    match &settings.work_root {
        Some(root) => {
            fs::create_dir_all(root)?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
}

fn finish(reporter: &mut ProgressReporter<'_>, work_dir: TempDir) {
    reporter.finish("cleaning up temporary files");
    let path = work_dir.path().to_path_buf();
    if let Err(err) = work_dir.close() {
        warn!("failed to remove working directory {}: {err}", path.display());
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
