//! Per-language translation tables, keyed by object UUID and field name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::envs::Language;

type FieldTranslations = HashMap<String, Vec<String>>;
type ObjectTranslations = HashMap<String, FieldTranslations>;

/// Translations for every language a flow carries beyond its base language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Localization {
    languages: HashMap<String, ObjectTranslations>,
}

impl Localization {
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// The translated text array for the given object and field, if one
    /// exists and is non-empty.
    pub fn get_translation(
        &self,
        language: &Language,
        uuid: &str,
        key: &str,
    ) -> Option<&Vec<String>> {
        self.languages
            .get(language.as_str())
            .and_then(|objects| objects.get(uuid))
            .and_then(|fields| fields.get(key))
            .filter(|texts| !texts.is_empty() && texts.iter().any(|t| !t.is_empty()))
    }
}
