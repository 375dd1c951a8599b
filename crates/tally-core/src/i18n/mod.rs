//! Locale Message Resolver
//!
//! Returns the UI message tree for a language code:
//! - Bundled locales (en, ar) are compiled in and returned directly
//! - Other languages are machine-translated from the source locale once,
//!   key by key, and memoized in a `TranslationCache`
//!
//! Translation is best-effort: a key whose translation fails keeps the source
//! text, so the result never has missing keys.

mod cache;
mod flatten;
mod translator;

pub use cache::TranslationCache;
pub use flatten::{dotted, flatten, unflatten, KeyPath};
pub use translator::{GoogleTranslator, MockTranslator, Translator};

use std::fs;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::TranslationConfig;
use crate::error::{Error, Result};

/// Default source language of the bundled messages
pub const SOURCE_LANG: &str = "en";

const EN_MESSAGES: &str = include_str!("../../locales/en.json");
const AR_MESSAGES: &str = include_str!("../../locales/ar.json");

/// Languages written right to left
const RTL_LANGUAGES: &[&str] = &["ar", "fa", "ur", "ps", "yi", "he", "dv", "ug", "sd", "ku"];

/// Languages pre-built by `generate_locale_files` when none are given
pub const DEFAULT_TARGET_LANGS: &[&str] = &[
    "ar", "fr", "de", "it", "es", "pl", "nl", "ko", "tr", "zh", "hi", "bn", "pt", "ru", "ja", "jv",
    "vi", "th", "id", "sv", "uk", "ro", "el", "cs", "hu", "fi", "da", "no", "ms", "sr", "hr", "sk",
    "bg", "lt", "sl", "et", "lv", "is", "mt", "ga", "cy", "eu", "gl", "af", "sw", "zu", "xh", "st",
    "tn", "sn", "yo", "ig", "lb", "sq", "hy", "az", "ka", "mk", "mn", "ne", "si", "ta", "te", "kn",
    "ml", "pa", "gu", "or", "as", "mr", "fa", "he", "ur", "ku", "ps", "sd", "ug", "yi", "dv",
];

/// Trimmed, lowercased language code; empty means the source language
pub fn normalize_lang(lang: &str) -> String {
    let lang = lang.trim().to_lowercase();
    if lang.is_empty() {
        SOURCE_LANG.to_string()
    } else {
        lang
    }
}

/// Compiled-in messages for `lang`, if it is bundled
pub fn bundled(lang: &str) -> Option<Result<Value>> {
    let raw = match lang {
        "en" => EN_MESSAGES,
        "ar" => AR_MESSAGES,
        _ => return None,
    };
    Some(serde_json::from_str(raw).map_err(Error::from))
}

pub fn bundled_languages() -> &'static [&'static str] {
    &["en", "ar"]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl TextDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        }
    }
}

impl std::fmt::Display for TextDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn text_direction(lang: &str) -> TextDirection {
    if RTL_LANGUAGES.contains(&normalize_lang(lang).as_str()) {
        TextDirection::Rtl
    } else {
        TextDirection::Ltr
    }
}

/// Outcome of a `generate_locale_files` run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateReport {
    pub written: Vec<String>,
    /// Already present or the source language
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Resolves message trees, translating and caching unbundled languages
#[derive(Clone)]
pub struct MessageResolver {
    translator: Arc<dyn Translator>,
    cache: Arc<TranslationCache>,
    source_lang: String,
    /// Keys translated in parallel
    concurrency: usize,
}

impl MessageResolver {
    pub fn new(translator: Arc<dyn Translator>, cache: Arc<TranslationCache>) -> Self {
        Self {
            translator,
            cache,
            source_lang: SOURCE_LANG.to_string(),
            concurrency: 8,
        }
    }

    /// Resolver backed by the configured translation endpoint
    pub fn from_config(config: &TranslationConfig, cache: Arc<TranslationCache>) -> Result<Self> {
        let translator = GoogleTranslator::from_config(config)?;
        Ok(Self::new(Arc::new(translator), cache)
            .with_source_lang(&config.source_lang)
            .with_concurrency(config.concurrency))
    }

    pub fn with_source_lang(mut self, lang: &str) -> Self {
        self.source_lang = normalize_lang(lang);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn translator_name(&self) -> &str {
        self.translator.name()
    }

    fn source_messages(&self) -> Result<Value> {
        bundled(&self.source_lang).unwrap_or_else(|| {
            Err(Error::Config(format!(
                "Source language {} is not bundled",
                self.source_lang
            )))
        })
    }

    /// Message tree for `lang`
    pub async fn resolve(&self, lang: &str) -> Result<Value> {
        let lang = normalize_lang(lang);

        if let Some(messages) = bundled(&lang) {
            return messages;
        }
        if let Some(messages) = self.cache.get(&lang) {
            debug!(lang = %lang, "Translation cache hit");
            return Ok(messages);
        }

        info!(lang = %lang, translator = self.translator.name(), "Translating messages");
        let source = self.source_messages()?;
        let translated = self.translate_messages(&source, &lang).await;

        self.cache.insert(&lang, translated.clone());
        info!(lang = %lang, "Translation cached");
        Ok(translated)
    }

    /// Translate every string leaf, keeping the source text where a key fails
    pub async fn translate_messages(&self, source: &Value, lang: &str) -> Value {
        let results = self.translate_leaves(source, lang).await;
        let mut failures = 0usize;

        let leaves = results.into_iter().map(|(path, original, result)| {
            let value = match result {
                Ok(value) => value,
                Err(e) => {
                    failures += 1;
                    warn!(key = %dotted(&path), lang, error = %e, "Keeping source text");
                    original
                }
            };
            (path, value)
        });
        let messages = unflatten(leaves.collect::<Vec<_>>());

        if failures > 0 {
            warn!(lang, failures, "Some messages were not translated");
        }
        messages
    }

    /// Translate every string leaf, failing if any key fails
    pub async fn translate_messages_strict(&self, source: &Value, lang: &str) -> Result<Value> {
        let results = self.translate_leaves(source, lang).await;
        let mut leaves = Vec::with_capacity(results.len());
        for (path, _, result) in results {
            leaves.push((path, result?));
        }
        Ok(unflatten(leaves))
    }

    /// Translate string leaves concurrently; non-string leaves pass through
    ///
    /// Results come back in the source order.
    async fn translate_leaves(
        &self,
        source: &Value,
        lang: &str,
    ) -> Vec<(KeyPath, Value, Result<Value>)> {
        let mut results: Vec<(usize, KeyPath, Value, Result<Value>)> =
            stream::iter(flatten(source).into_iter().enumerate())
                .map(|(index, (path, value))| async move {
                    let result = match value.as_str() {
                        Some(text) => self
                            .translator
                            .translate(text, &self.source_lang, lang)
                            .await
                            .map(Value::String),
                        None => Ok(value.clone()),
                    };
                    (index, path, value, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        results.sort_by_key(|(index, ..)| *index);
        results
            .into_iter()
            .map(|(_, path, value, result)| (path, value, result))
            .collect()
    }

    /// Write `<lang>.json` into `dir` for every language not already there
    ///
    /// The source is `dir/<source>.json` when present, else the bundled
    /// source messages. A language with any failed key is skipped entirely so
    /// no partially translated file is written.
    pub async fn generate_locale_files(&self, dir: &Path, langs: &[&str]) -> Result<GenerateReport> {
        fs::create_dir_all(dir)?;

        let source_path = dir.join(format!("{}.json", self.source_lang));
        let source = if source_path.exists() {
            serde_json::from_str(&fs::read_to_string(&source_path)?)?
        } else {
            debug!(path = %source_path.display(), "No source file, using bundled messages");
            self.source_messages()?
        };

        let mut report = GenerateReport::default();
        for lang in langs.iter().map(|l| normalize_lang(l)) {
            let target = dir.join(format!("{}.json", lang));
            if lang == self.source_lang || target.exists() {
                debug!(lang = %lang, "Skipping existing language");
                report.skipped.push(lang);
                continue;
            }

            info!(lang = %lang, "Translating locale file");
            match self.translate_messages_strict(&source, &lang).await {
                Ok(messages) => {
                    fs::write(&target, serde_json::to_string_pretty(&messages)?)?;
                    info!(path = %target.display(), "Saved locale file");
                    report.written.push(lang);
                }
                Err(e) => {
                    warn!(lang = %lang, error = %e, "Failed to translate, skipping language");
                    report.failed.push(lang);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mock_resolver(translator: MockTranslator) -> MessageResolver {
        MessageResolver::new(Arc::new(translator), Arc::new(TranslationCache::new()))
    }

    fn leaf_count(value: &Value) -> usize {
        flatten(value).len()
    }

    #[test]
    fn test_normalize_lang() {
        assert_eq!(normalize_lang("  FR "), "fr");
        assert_eq!(normalize_lang(""), "en");
        assert_eq!(normalize_lang("   "), "en");
    }

    #[test]
    fn test_text_direction() {
        for lang in ["ar", "fa", "ur", "ps", "yi", "he", "AR"] {
            assert_eq!(text_direction(lang), TextDirection::Rtl, "{}", lang);
        }
        assert_eq!(text_direction("en"), TextDirection::Ltr);
        assert_eq!(text_direction("fr").as_str(), "ltr");
    }

    #[test]
    fn test_bundled_locales_share_keys() {
        let en = bundled("en").unwrap().unwrap();
        let ar = bundled("ar").unwrap().unwrap();
        let en_keys: Vec<KeyPath> = flatten(&en).into_iter().map(|(p, _)| p).collect();
        let ar_keys: Vec<KeyPath> = flatten(&ar).into_iter().map(|(p, _)| p).collect();
        assert_eq!(en_keys, ar_keys);
        assert!(bundled("fr").is_none());
    }

    #[tokio::test]
    async fn test_bundled_returned_without_translation() {
        let translator = MockTranslator::new();
        let resolver = mock_resolver(translator.clone());

        let ar = resolver.resolve("ar").await.unwrap();
        assert_eq!(ar, bundled("ar").unwrap().unwrap());
        let en = resolver.resolve("").await.unwrap();
        assert_eq!(en, bundled("en").unwrap().unwrap());

        assert_eq!(translator.calls(), 0);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_unbundled_language_is_translated_and_cached() {
        let translator = MockTranslator::new();
        let resolver = mock_resolver(translator.clone());
        let source = bundled("en").unwrap().unwrap();

        let fr = resolver.resolve("FR").await.unwrap();
        assert_eq!(leaf_count(&fr), leaf_count(&source));
        assert_eq!(fr["app"]["title"], json!("[fr] Tally"));

        let calls = translator.calls();
        let again = resolver.resolve("fr").await.unwrap();
        assert_eq!(again, fr);
        assert_eq!(translator.calls(), calls);

        resolver.cache().evict("fr");
        resolver.resolve("fr").await.unwrap();
        assert_eq!(translator.calls(), calls * 2);
    }

    #[tokio::test]
    async fn test_failed_keys_keep_source_text() {
        let resolver = mock_resolver(MockTranslator::failing_on(["Expenses"])).with_concurrency(2);
        let source = json!({
            "totals": { "income": "Income", "expenses": "Expenses", "balance": "Balance" },
            "version": 2,
            "tags": ["a", "b"]
        });

        let out = resolver.translate_messages(&source, "de").await;
        assert_eq!(
            out,
            json!({
                "totals": {
                    "income": "[de] Income",
                    "expenses": "Expenses",
                    "balance": "[de] Balance"
                },
                "version": 2,
                "tags": ["a", "b"]
            })
        );

        let strict = resolver.translate_messages_strict(&source, "de").await;
        assert!(matches!(strict, Err(Error::Translation(_))));
    }

    #[tokio::test]
    async fn test_isolated_caches() {
        let shared = Arc::new(TranslationCache::new());
        let a = MessageResolver::new(Arc::new(MockTranslator::new()), shared.clone());
        let b = MessageResolver::new(Arc::new(MockTranslator::new()), Arc::new(TranslationCache::new()));

        a.resolve("es").await.unwrap();
        assert!(shared.contains("es"));
        assert!(b.cache().is_empty());
    }

    #[tokio::test]
    async fn test_generate_locale_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("de.json"), "{}").unwrap();
        fs::write(
            dir.path().join("en.json"),
            r#"{ "nav": { "home": "Home", "broken": "Broken" } }"#,
        )
        .unwrap();

        let resolver = mock_resolver(MockTranslator::new());
        let report = resolver
            .generate_locale_files(dir.path(), &["fr", "de", "en", "IT"])
            .await
            .unwrap();
        assert_eq!(report.written, vec!["fr", "it"]);
        assert_eq!(report.skipped, vec!["de", "en"]);
        assert!(report.failed.is_empty());

        let fr: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("fr.json")).unwrap()).unwrap();
        assert_eq!(fr["nav"]["home"], json!("[fr] Home"));
        // Existing files are left alone
        assert_eq!(fs::read_to_string(dir.path().join("de.json")).unwrap(), "{}");

        let failing = mock_resolver(MockTranslator::failing_on(["Broken"]));
        let report = failing
            .generate_locale_files(dir.path(), &["es"])
            .await
            .unwrap();
        assert_eq!(report.failed, vec!["es"]);
        assert!(!dir.path().join("es.json").exists());
    }
}
