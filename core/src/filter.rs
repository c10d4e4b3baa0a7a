//! Decides which language-file entries are sent for translation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const COMMAND_KEY_PREFIX: &str = "commands.";

/// Options for mod language files. Every flag defaults to "include".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModOptions {
    pub translate_desc: bool,
    pub translate_tooltip: bool,
    pub translate_gui: bool,
}

impl Default for ModOptions {
    fn default() -> Self {
        Self {
            translate_desc: true,
            translate_tooltip: true,
            translate_gui: true,
        }
    }
}

/// Options for the game's own language files. Every flag defaults to "include".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
    pub translate_items: bool,
    pub translate_entities: bool,
    pub translate_advancements: bool,
    pub translate_misc: bool,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            translate_items: true,
            translate_entities: true,
            translate_advancements: true,
            translate_misc: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateOptions {
    Mod(ModOptions),
    Game(GameOptions),
}

impl TranslateOptions {
    /// Whether the category gates let `key` through.
    fn allows_category(&self, key: &str) -> bool {
        match self {
            TranslateOptions::Mod(options) => {
                !((!options.translate_desc && key.contains(".desc"))
                    || (!options.translate_tooltip && key.contains(".tooltip"))
                    || (!options.translate_gui && key.contains(".gui")))
            }
            TranslateOptions::Game(options) => {
                let item = key.contains("item.");
                let entity = key.contains("entity.");
                let advancement = key.contains("advancements.");
                let misc = !(item || entity || advancement);

                !((!options.translate_items && item)
                    || (!options.translate_entities && entity)
                    || (!options.translate_advancements && advancement)
                    || (!options.translate_misc && misc))
            }
        }
    }
}

/// Why an entry was left untranslated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Command,
    CategoryDisabled,
    NotProse,
    AlreadyLocalized,
}

/// A key/value pair that passed every exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    pub key: String,
    pub source: String,
}

/// Applies the exclusion rules in order; `None` means the entry is eligible.
pub fn classify(key: &str, value: &Value, options: &TranslateOptions) -> Option<Exclusion> {
    if is_command_key(key) {
        return Some(Exclusion::Command);
    }

    if !options.allows_category(key) {
        return Some(Exclusion::CategoryDisabled);
    }

    let Some(text) = value.as_str() else {
        return Some(Exclusion::NotProse);
    };
    if !is_prose(text) {
        return Some(Exclusion::NotProse);
    }

    if contains_cjk(text) {
        return Some(Exclusion::AlreadyLocalized);
    }

    None
}

/// Eligible entries of `entries`, in the map's iteration order.
pub fn eligible_units(entries: &Map<String, Value>, options: &TranslateOptions) -> Vec<TranslationUnit> {
    entries
        .iter()
        .filter(|(key, value)| classify(key, value, options).is_none())
        .filter_map(|(key, value)| {
            value.as_str().map(|source| TranslationUnit {
                key: key.clone(),
                source: source.to_string(),
            })
        })
        .collect()
}

pub fn is_command_key(key: &str) -> bool {
    key.starts_with(COMMAND_KEY_PREFIX) || key.to_lowercase().contains("command")
}

/// True when `text` holds at least one CJK Unified Ideograph.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

fn is_prose(text: &str) -> bool {
    !text.trim().is_empty() && !text.chars().all(|c| c.is_ascii_digit())
}
