//! Per-file translation: filter, batch, call the endpoint, merge.

use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ai::{self, CompletionEndpoint, TranslationError};
use crate::batch;
use crate::filter::{self, TranslateOptions, TranslationUnit};
use crate::job::CancelFlag;
use crate::output;
use crate::progress::ProgressReporter;

#[derive(Debug, Error)]
pub enum TranslateError {
    /// The first batch of a file failed; treated as an endpoint
    /// misconfiguration rather than a transient fault.
    #[error("translation API error: {0}")]
    Api(#[from] TranslationError),

    #[error("translation cancelled")]
    Cancelled,

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to one language file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Written { eligible: usize, total: usize },
    /// The file could not be read or parsed and was left out.
    Skipped,
}

/// Translates `units` batch by batch, in order.
///
/// A failure of the first batch is returned as [`TranslateError::Api`]. Any
/// later failing batch keeps its source text. The returned map holds exactly
/// one value per unit.
pub async fn batch_translate(
    endpoint: &dyn CompletionEndpoint,
    units: &[TranslationUnit],
    batch_size: usize,
    reporter: &mut ProgressReporter<'_>,
    cancel: &CancelFlag,
) -> Result<HashMap<String, String>, TranslateError> {
    let mut result = HashMap::with_capacity(units.len());
    let batches = batch::partition(units, batch_size);
    let total = batches.len();

    for batch in &batches {
        if cancel.is_cancelled() {
            return Err(TranslateError::Cancelled);
        }

        let number = batch.index + 1;
        reporter.message(format!("translating batch {number}/{total} ({} texts)", batch.len()));

        let sources = batch.sources();
        let values = match ai::translate_batch(endpoint, &sources).await {
            Ok(values) => values,
            Err(err) if batch.is_first() => {
                reporter.message(format!("batch {number} failed: {err}"));
                return Err(TranslateError::Api(err));
            }
            Err(err) => {
                warn!("batch {number}/{total} failed, keeping source text: {err}");
                reporter.message(format!("batch {number} failed, keeping source text"));
                sources
            }
        };

        for (unit, value) in batch.units.iter().zip(values) {
            result.insert(unit.key.clone(), value);
        }
        reporter.message(format!("batch {number} done"));
    }

    Ok(result)
}

/// Rebuilds `entries` in its own key order, taking the translated value where
/// one exists. Non-string values pass through untouched.
pub fn merge_translations(
    entries: &Map<String, Value>,
    translations: &HashMap<String, String>,
) -> Map<String, Value> {
    entries
        .iter()
        .map(|(key, value)| {
            let merged = match translations.get(key) {
                Some(text) => Value::String(text.clone()),
                None => value.clone(),
            };
            (key.clone(), merged)
        })
        .collect()
}

/// Settings shared by every file of one invocation.
pub struct FileTranslator<'a> {
    pub endpoint: &'a dyn CompletionEndpoint,
    pub options: TranslateOptions,
    pub batch_size: usize,
    pub cancel: &'a CancelFlag,
}

impl FileTranslator<'_> {
    /// Translates `source` into `target`. An unreadable or unparsable source
    /// is logged and skipped.
    pub async fn translate_file(
        &self,
        source: &Path,
        target: &Path,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<FileOutcome, TranslateError> {
        let entries = match load_entries(source) {
            Ok(entries) => entries,
            Err(reason) => {
                warn!("skipping {}: {reason}", source.display());
                reporter.message(format!("skipped unreadable file {}", source.display()));
                return Ok(FileOutcome::Skipped);
            }
        };

        let units = filter::eligible_units(&entries, &self.options);
        info!(
            "{}: {} of {} entries eligible",
            source.display(),
            units.len(),
            entries.len()
        );

        let translations = batch_translate(
            self.endpoint,
            &units,
            self.batch_size,
            reporter,
            self.cancel,
        )
        .await?;
        let merged = merge_translations(&entries, &translations);

        if target.exists() {
            warn!("{} already exists and will be replaced", target.display());
        }
        output::write_lang_file(target, &merged).map_err(|source| TranslateError::Write {
            path: target.display().to_string(),
            source,
        })?;

        Ok(FileOutcome::Written {
            eligible: units.len(),
            total: entries.len(),
        })
    }
}

fn load_entries(path: &Path) -> Result<Map<String, Value>, String> {
    let text = output::read_lang_file(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&text).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::{PROMPT_FOOTER, PROMPT_HEADER};
    use crate::filter::ModOptions;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Replies from a fixed script, one entry per call; `None` fails the call.
    struct Scripted {
        replies: Mutex<Vec<Option<String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Option<&str>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().map(|r| r.map(String::from)).collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionEndpoint for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> Result<Option<String>, TranslationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.lock().unwrap().pop().flatten() {
                Some(text) => Ok(Some(text)),
                None => Err(TranslationError::Timeout { seconds: 60 }),
            }
        }
    }

    /// Upper-cases every source line of the prompt.
    struct Shouting;

    #[async_trait]
    impl CompletionEndpoint for Shouting {
        fn name(&self) -> &str {
            "shouting"
        }

        async fn complete(&self, prompt: &str) -> Result<Option<String>, TranslationError> {
            let body = prompt
                .strip_prefix(PROMPT_HEADER)
                .and_then(|rest| rest.strip_suffix(PROMPT_FOOTER))
                .unwrap_or_default();
            Ok(Some(body.to_uppercase()))
        }
    }

    fn units(sources: &[&str]) -> Vec<TranslationUnit> {
        sources
            .iter()
            .enumerate()
            .map(|(i, source)| TranslationUnit {
                key: format!("key.{i}"),
                source: source.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn single_batch_scenario_leaves_command_key_alone() {
        let entries = json!({"item.foo.name": "Magic Sword", "commands.give.usage": "give <item>"});
        let entries = entries.as_object().unwrap();
        let options = TranslateOptions::Mod(ModOptions::default());
        let eligible = filter::eligible_units(entries, &options);
        assert_eq!(eligible.len(), 1);

        let endpoint = Scripted::new(vec![Some("魔法剑")]);
        let mut reporter = ProgressReporter::new(&NoProgress);
        let translations = batch_translate(&endpoint, &eligible, 20, &mut reporter, &CancelFlag::new())
            .await
            .unwrap();

        let merged = merge_translations(entries, &translations);
        assert_eq!(
            Value::Object(merged),
            json!({"item.foo.name": "魔法剑", "commands.give.usage": "give <item>"})
        );
    }

    #[tokio::test]
    async fn first_batch_failure_escalates() {
        let endpoint = Scripted::new(vec![None, Some("B")]);
        let mut reporter = ProgressReporter::new(&NoProgress);

        let err = batch_translate(&endpoint, &units(&["a", "b"]), 1, &mut reporter, &CancelFlag::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::Api(TranslationError::Timeout { .. })));
        assert!(err.to_string().starts_with("translation API error"));
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn later_batch_failure_falls_back_to_source() {
        let endpoint = Scripted::new(vec![Some("一"), None, Some("三")]);
        let mut reporter = ProgressReporter::new(&NoProgress);

        let result = batch_translate(&endpoint, &units(&["one", "two", "three"]), 1, &mut reporter, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result["key.0"], "一");
        assert_eq!(result["key.1"], "two");
        assert_eq!(result["key.2"], "三");
    }

    #[tokio::test]
    async fn cancellation_is_checked_before_each_batch() {
        let endpoint = Scripted::new(vec![Some("一")]);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut reporter = ProgressReporter::new(&NoProgress);

        let err = batch_translate(&endpoint, &units(&["one"]), 1, &mut reporter, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::Cancelled));
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn merge_keeps_order_and_non_string_values() {
        let entries = json!({"b": "two", "a": 1, "c": ["x"], "d": "four"});
        let translations = HashMap::from([("d".to_string(), "四".to_string())]);

        let merged = merge_translations(entries.as_object().unwrap(), &translations);

        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["b", "a", "c", "d"]);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["c"], json!(["x"]));
        assert_eq!(merged["d"], "四");
    }

    #[tokio::test]
    async fn file_translation_writes_target_and_skips_broken_sources() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("en_us.json");
        let target = dir.path().join("zh_cn.json");
        std::fs::write(&source, r#"{"block.demo.ore": "Ore", "block.demo.count": "42"}"#).unwrap();

        let cancel = CancelFlag::new();
        let translator = FileTranslator {
            endpoint: &Shouting,
            options: TranslateOptions::Mod(ModOptions::default()),
            batch_size: 20,
            cancel: &cancel,
        };
        let mut reporter = ProgressReporter::new(&NoProgress);

        let outcome = translator.translate_file(&source, &target, &mut reporter).await.unwrap();
        assert_eq!(outcome, FileOutcome::Written { eligible: 1, total: 2 });
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(written, json!({"block.demo.ore": "ORE", "block.demo.count": "42"}));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{not json").unwrap();
        let outcome = translator
            .translate_file(&broken, &dir.path().join("zh_cn_broken.json"), &mut reporter)
            .await
            .unwrap();
        assert_eq!(outcome, FileOutcome::Skipped);
        assert!(!dir.path().join("zh_cn_broken.json").exists());
    }
}
