//! Locale command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tally_core::config::Config;
use tally_core::i18n::{dotted, flatten, normalize_lang, DEFAULT_TARGET_LANGS};
use tally_core::{text_direction, MessageResolver, TranslationCache};

fn build_resolver(config: &Config) -> Result<MessageResolver> {
    MessageResolver::from_config(&config.translation, Arc::new(TranslationCache::new()))
        .context("Failed to create translator")
}

pub async fn cmd_locale_show(config: &Config, lang: &str, flat: bool) -> Result<()> {
    let resolver = build_resolver(config)?;
    let lang = normalize_lang(lang);
    let messages = resolver
        .resolve(&lang)
        .await
        .with_context(|| format!("Failed to resolve messages for {}", lang))?;

    println!("🌐 {} ({})", lang, text_direction(&lang));

    if flat {
        for (path, value) in flatten(&messages) {
            match value.as_str() {
                Some(text) => println!("{} = {}", dotted(&path), text),
                None => println!("{} = {}", dotted(&path), value),
            }
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    }

    Ok(())
}

pub async fn cmd_locale_generate(config: &Config, dir: &Path, langs: &[String]) -> Result<()> {
    let resolver = build_resolver(config)?;
    let langs: Vec<&str> = if langs.is_empty() {
        DEFAULT_TARGET_LANGS.to_vec()
    } else {
        langs.iter().map(String::as_str).collect()
    };

    println!(
        "🌐 Generating {} locale files in {}",
        langs.len(),
        dir.display()
    );

    let report = resolver
        .generate_locale_files(dir, &langs)
        .await
        .context("Failed to generate locale files")?;

    println!();
    println!("   ─────────────────────────────────────────────");
    println!("   Written:  {}", report.written.len());
    println!("   Skipped:  {}", report.skipped.len());
    println!("   Failed:   {}", report.failed.len());
    if !report.failed.is_empty() {
        println!();
        println!("⚠️  Failed languages: {}", report.failed.join(", "));
        println!("   Re-run the command to retry them.");
    }

    Ok(())
}
