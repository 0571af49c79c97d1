//! Keyword-triggered canned replies, checked before any AI routing.

use crate::localization::t_lang;
use crate::models::{BotSettings, Language, RuleEntry};

/// Bundled rules in match order
const DEFAULT_RULES: [&str; 5] = ["greeting", "thanks", "delivery", "payment", "hours"];

/// Ordered keyword table for one language; the first matching entry wins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleResponseTable {
    entries: Vec<RuleEntry>,
}

impl RuleResponseTable {
    pub fn new(entries: Vec<RuleEntry>) -> Self {
        Self { entries }
    }

    /// Table configured in bot settings for `language`, or the bundled default
    pub fn for_language(settings: &BotSettings, language: Language) -> Self {
        match settings.rule_based_responses.get(&language) {
            Some(entries) if !entries.is_empty() => Self::new(entries.clone()),
            _ => Self::default_for(language),
        }
    }

    /// Bundled table built from the `rule-*` Fluent messages
    pub fn default_for(language: Language) -> Self {
        let entries = DEFAULT_RULES
            .iter()
            .flat_map(|rule| {
                let response = t_lang(&format!("rule-{rule}"), language);
                t_lang(&format!("rule-{rule}-keywords"), language)
                    .split(',')
                    .map(str::trim)
                    .filter(|keyword| !keyword.is_empty())
                    .map(|keyword| RuleEntry::new(keyword, response.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        Self::new(entries)
    }

    /// Case-insensitive substring match; table order decides ties
    pub fn lookup(&self, message: &str) -> Option<&str> {
        let message = message.to_lowercase();
        self.entries
            .iter()
            .find(|entry| {
                let keyword = entry.keyword.trim().to_lowercase();
                !keyword.is_empty() && message.contains(&keyword)
            })
            .map(|entry| entry.response.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = RuleResponseTable::default_for(Language::Ru);
        let greeting = t_lang("rule-greeting", Language::Ru);
        assert_eq!(table.lookup("ПРИВЕТ, есть чайники?"), Some(greeting.as_str()));
        assert_eq!(table.lookup("Здравствуйте"), Some(greeting.as_str()));
        assert_eq!(table.lookup("покажите чайники"), None);
    }

    #[test]
    fn test_default_tables_come_from_locales() {
        let uz = RuleResponseTable::default_for(Language::Uz);
        assert_eq!(uz.len(), 5);
        assert_eq!(
            uz.lookup("To'lov qanday qilinadi?"),
            Some(t_lang("rule-payment", Language::Uz).as_str())
        );
        assert_eq!(RuleResponseTable::default_for(Language::Ru).len(), 6);
        assert!(!uz.lookup("salom").unwrap_or_default().starts_with("Missing translation"));
    }

    #[test]
    fn test_first_match_wins() {
        let table = RuleResponseTable::new(vec![
            RuleEntry::new("narx", "first"),
            RuleEntry::new("narxi", "second"),
        ]);
        assert_eq!(table.lookup("choynak narxi qancha?"), Some("first"));
    }

    #[test]
    fn test_settings_table_overrides_default() {
        let mut rules = HashMap::new();
        rules.insert(Language::Uz, vec![RuleEntry::new("aksiya", "Aksiyalar kanalda")]);
        let settings = BotSettings {
            rule_based_responses: rules,
            ..BotSettings::default()
        };

        let uz = RuleResponseTable::for_language(&settings, Language::Uz);
        assert_eq!(uz.len(), 1);
        assert_eq!(uz.lookup("Aksiya bormi"), Some("Aksiyalar kanalda"));

        // No Russian table configured: bundled default applies
        let ru = RuleResponseTable::for_language(&settings, Language::Ru);
        assert_eq!(ru, RuleResponseTable::default_for(Language::Ru));
    }

    #[test]
    fn test_blank_keywords_never_match() {
        let table = RuleResponseTable::new(vec![RuleEntry::new("  ", "never")]);
        assert_eq!(table.lookup("anything"), None);
    }
}
