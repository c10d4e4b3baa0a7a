//! Shared fixtures for the pipeline tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use mc_translator_core::ai::prompt::{PROMPT_FOOTER, PROMPT_HEADER};
use mc_translator_core::{CompletionEndpoint, ProgressEvent, TranslationError};
use zip::write::FileOptions;

/// Writes a zip archive holding `entries` (name, content).
pub fn write_archive(path: &Path, entries: &[(&str, &str)]) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        writer.start_file(*name, FileOptions::<()>::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Every file entry of an archive, by name.
pub fn read_archive(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        if file.is_dir() {
            continue;
        }
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        entries.insert(file.name().to_string(), content);
    }
    entries
}

pub fn read_json_entry(path: &Path, name: &str) -> serde_json::Value {
    let entries = read_archive(path);
    let content = entries
        .get(name)
        .unwrap_or_else(|| panic!("{name} missing; archive holds {:?}", entries.keys()));
    serde_json::from_slice(content).unwrap()
}

/// Source lines of a rendered prompt.
pub fn prompt_sources(prompt: &str) -> Vec<String> {
    prompt
        .strip_prefix(PROMPT_HEADER)
        .and_then(|rest| rest.strip_suffix(PROMPT_FOOTER))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Answers with a fixed translation for known lines and echoes the rest.
#[derive(Default)]
pub struct Dictionary {
    entries: HashMap<String, String>,
    pub prompts: Mutex<Vec<String>>,
}

impl Dictionary {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(source, target)| (source.to_string(), target.to_string()))
                .collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompletionEndpoint for Dictionary {
    fn name(&self) -> &str {
        "dictionary"
    }

    async fn complete(&self, prompt: &str) -> Result<Option<String>, TranslationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let lines: Vec<String> = prompt_sources(prompt)
            .into_iter()
            .map(|line| self.entries.get(&line).cloned().unwrap_or(line))
            .collect();
        Ok(Some(lines.join("\n")))
    }
}

/// Collects progress events.
#[derive(Default)]
pub struct Recorder(pub Mutex<Vec<ProgressEvent>>);

impl Recorder {
    pub fn percents(&self) -> Vec<f32> {
        self.0.lock().unwrap().iter().filter_map(|event| event.percent).collect()
    }
}

impl mc_translator_core::ProgressSink for Recorder {
    fn report(&self, event: ProgressEvent) {
        self.0.lock().unwrap().push(event);
    }
}
