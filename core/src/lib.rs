pub mod ai;
pub mod archive;
pub mod batch;
pub mod config;
pub mod filter;
pub mod job;
pub mod jobs;
pub mod locator;
pub mod output;
pub mod progress;
mod time;
pub mod translate;

/// Language code of every file this crate writes.
pub const TARGET_LANG_CODE: &str = "zh_cn";

/// Files whose name starts with this prefix are existing translations and are
/// never used as a source.
pub const TARGET_LANG_PREFIX: &str = "zh_";

pub use ai::{CompletionEndpoint, HttpEndpoint, TranslationError};
pub use archive::{is_archive_file, ArchiveError};
pub use config::{ConfigError, EndpointConfig};
pub use filter::{GameOptions, ModOptions, TranslateOptions, TranslationUnit};
pub use job::runner::JobRunner;
pub use job::CancelFlag;
pub use jobs::{
    translate_game_version, translate_mod, JobContext, JobKind, JobRequest, JobSettings,
    PipelineError,
};
pub use locator::{BundleKind, LanguageFile, ModVariant, ResourceBundle};
pub use progress::{ProgressEvent, ProgressSink};
