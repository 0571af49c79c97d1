//! # Localization Module
//!
//! Fluent-backed message catalog for the two languages the shop serves.
//! Resources are embedded at build time so the bot does not depend on the
//! working directory it is started from.

use anyhow::Result;
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;
use unic_langid::LanguageIdentifier;

use crate::models::Language;

const UZ_RESOURCE: &str = include_str!("../locales/uz/main.ftl");
const RU_RESOURCE: &str = include_str!("../locales/ru/main.ftl");

/// Localization manager holding one bundle per supported language
pub struct LocalizationManager {
    bundles: HashMap<Language, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with the bundled resources
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        bundles.insert(Language::Uz, Self::create_bundle("uz", UZ_RESOURCE)?);
        bundles.insert(Language::Ru, Self::create_bundle("ru", RU_RESOURCE)?);
        Ok(Self { bundles })
    }

    fn create_bundle(locale: &str, source: &str) -> Result<FluentBundle<FluentResource>> {
        let locale: LanguageIdentifier = locale.parse()?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Telegram renders bidi isolation marks literally
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow::anyhow!("Invalid Fluent resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Duplicate Fluent messages: {errors:?}"))?;

        Ok(bundle)
    }

    /// Get a localized message in the given language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: Language,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let Some(bundle) = self.bundles.get(&language) else {
            return format!("Missing translation: {key}");
        };

        let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) else {
            return format!("Missing translation: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            warn!(key = %key, language = %language, errors = ?errors, "Fluent formatting errors");
        }
        value.into_owned()
    }
}

static LOCALIZATION_MANAGER: LazyLock<Option<LocalizationManager>> = LazyLock::new(|| {
    LocalizationManager::new()
        .map_err(|e| tracing::error!(error = %e, "Failed to load localization resources"))
        .ok()
});

/// Get the global localization manager
pub fn localization_manager() -> Option<&'static LocalizationManager> {
    LOCALIZATION_MANAGER.as_ref()
}

/// Localized message without arguments
pub fn t_lang(key: &str, language: Language) -> String {
    match localization_manager() {
        Some(manager) => manager.get_message_in_language(key, language, None),
        None => format!("Missing translation: {key}"),
    }
}

/// Localized message with string arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: Language) -> String {
    let args_map: HashMap<&str, &str> = args.iter().copied().collect();
    match localization_manager() {
        Some(manager) => manager.get_message_in_language(key, language, Some(&args_map)),
        None => format!("Missing translation: {key}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundles_load_for_both_languages() {
        let manager = LocalizationManager::new().expect("bundled resources should parse");
        let uz = manager.get_message_in_language("cart-empty", Language::Uz, None);
        let ru = manager.get_message_in_language("cart-empty", Language::Ru, None);
        assert!(uz.contains("bo'sh"));
        assert!(ru.contains("пуста"));
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(
            t_lang("no-such-key", Language::Ru),
            "Missing translation: no-such-key"
        );
    }

    #[test]
    fn test_arguments_are_substituted() {
        let text = t_args_lang(
            "quantity-invalid",
            &[("min", "1"), ("max", "10000")],
            Language::Uz,
        );
        assert!(text.contains('1'));
        assert!(text.contains("10000"));
    }
}
