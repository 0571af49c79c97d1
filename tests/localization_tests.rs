//! # Localization Tests
//!
//! Message retrieval and formatting for both shop languages, plus key
//! parity between the bundled resources.

use savdo_bot::localization::{t_args_lang, t_lang, LocalizationManager};
use savdo_bot::models::Language;
use std::collections::{BTreeSet, HashMap};

fn setup_localization() -> LocalizationManager {
    LocalizationManager::new().expect("Failed to create localization manager")
}

fn message_ids(source: &str) -> BTreeSet<String> {
    source
        .lines()
        .filter(|line| !line.starts_with(' ') && !line.starts_with('#'))
        .filter_map(|line| line.split_once(" ="))
        .map(|(id, _)| id.trim().to_string())
        .collect()
}

#[test]
fn test_every_key_exists_in_both_languages() {
    let uz = message_ids(include_str!("../locales/uz/main.ftl"));
    let ru = message_ids(include_str!("../locales/ru/main.ftl"));
    assert!(!uz.is_empty());
    assert_eq!(uz, ru, "uz and ru resources define different keys");

    let manager = setup_localization();
    for key in &uz {
        for language in [Language::Uz, Language::Ru] {
            let message = manager.get_message_in_language(key, language, None);
            assert!(
                !message.starts_with("Missing translation"),
                "{key} missing in {language}"
            );
        }
    }
}

#[test]
fn test_get_message_nonexistent_key() {
    let manager = setup_localization();
    let message = manager.get_message_in_language("nonexistent-key", Language::Uz, None);
    assert_eq!(message, "Missing translation: nonexistent-key");
}

#[test]
fn test_get_message_with_args() {
    let manager = setup_localization();
    let mut args = HashMap::new();
    args.insert("name", "Dilnoza");

    let uz = manager.get_message_in_language("welcome", Language::Uz, Some(&args));
    let ru = manager.get_message_in_language("welcome", Language::Ru, Some(&args));
    assert!(uz.contains("Dilnoza"));
    assert!(ru.contains("Dilnoza"));
    assert_ne!(uz, ru);
}

#[test]
fn test_no_bidi_isolation_marks() {
    let text = t_args_lang("cart-total", &[("total", "50 so'm")], Language::Uz);
    assert!(!text.contains('\u{2068}'));
    assert!(!text.contains('\u{2069}'));
    assert!(text.ends_with("50 so'm"));
}

#[test]
fn test_language_helpers_differ() {
    assert_ne!(t_lang("btn-catalog", Language::Uz), t_lang("btn-catalog", Language::Ru));
    assert_eq!(t_lang("currency", Language::Ru), "сум");
}
