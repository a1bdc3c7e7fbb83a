//! Modifiers are reified changes to the contact. Actions build them, the
//! engine applies them, and the sprint records them so the host can mirror
//! the same change to its own storage.

use serde::{Deserialize, Serialize};

use super::contact::{Contact, Urn};
use super::events::EventPayload;
use super::{FieldRef, GroupRef};
use crate::envs::Language;

/// A single change to a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Modifier {
    Name {
        #[serde(default)]
        name: String,
    },
    Language {
        #[serde(default)]
        language: String,
    },
    Field {
        field: FieldRef,
        #[serde(default)]
        value: String,
    },
    Groups {
        groups: Vec<GroupRef>,
        modification: GroupModification,
    },
    Urn {
        urn: Urn,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupModification {
    Add,
    Remove,
}

impl Modifier {
    /// Applies this change to the contact, returning the events describing
    /// what actually changed. A no-op change (same language, group already
    /// present) produces no events.
    pub fn apply(&self, contact: &mut Contact) -> Vec<EventPayload> {
        match self {
            Modifier::Name { name } => {
                let new_name = if name.is_empty() { None } else { Some(name.clone()) };
                if contact.name == new_name {
                    return Vec::new();
                }
                contact.name = new_name;
                vec![EventPayload::ContactNameChanged { name: name.clone() }]
            }

            Modifier::Language { language } => {
                let new_language = if language.is_empty() {
                    None
                } else {
                    match Language::parse(language) {
                        Ok(lang) => Some(lang),
                        Err(_) => return Vec::new(),
                    }
                };
                if contact.language == new_language {
                    return Vec::new();
                }
                contact.language = new_language;
                vec![EventPayload::ContactLanguageChanged { language: language.clone() }]
            }

            Modifier::Field { field, value } => {
                let existing = contact.fields.get(&field.key);
                if existing.map(String::as_str).unwrap_or_default() == value {
                    return Vec::new();
                }
                if value.is_empty() {
                    contact.fields.remove(&field.key);
                } else {
                    contact.fields.insert(field.key.clone(), value.clone());
                }
                vec![EventPayload::ContactFieldChanged { field: field.clone(), value: value.clone() }]
            }

            Modifier::Groups { groups, modification } => {
                let mut changed = Vec::new();
                for group in groups {
                    let applied = match modification {
                        GroupModification::Add => contact.add_group(group.clone()),
                        GroupModification::Remove => contact.remove_group(&group.uuid),
                    };
                    if applied {
                        changed.push(group.clone());
                    }
                }
                if changed.is_empty() {
                    return Vec::new();
                }
                match modification {
                    GroupModification::Add => {
                        vec![EventPayload::ContactGroupsAdded { groups: changed }]
                    }
                    GroupModification::Remove => {
                        vec![EventPayload::ContactGroupsRemoved { groups: changed }]
                    }
                }
            }

            Modifier::Urn { urn } => {
                if !contact.add_urn(urn.clone()) {
                    return Vec::new();
                }
                vec![EventPayload::ContactUrnAdded { urn: urn.clone() }]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_contact() -> Contact {
        Contact {
            uuid: "5d76d86b-3bb9-4d5a-b822-c9d86f5d8e4f".to_string(),
            id: None,
            name: Some("Ben".to_string()),
            language: None,
            timezone: None,
            created_on: "2018-01-01T12:00:00Z".parse().unwrap(),
            urns: Vec::new(),
            groups: Vec::new(),
            fields: HashMap::new(),
        }
    }

    #[test]
    fn test_apply() {
        let mut contact = test_contact();

        let events = Modifier::Language { language: "fra".to_string() }.apply(&mut contact);
        assert_eq!(1, events.len());
        assert_eq!(Some(Language::parse("fra").unwrap()), contact.language);

        // applying the same change again is a no-op
        let events = Modifier::Language { language: "fra".to_string() }.apply(&mut contact);
        assert!(events.is_empty());

        let field = FieldRef { key: "gender".to_string(), name: "Gender".to_string() };
        let events = Modifier::Field { field, value: "Male".to_string() }.apply(&mut contact);
        assert_eq!(1, events.len());
        assert_eq!("Male", contact.fields["gender"]);

        let group = GroupRef {
            uuid: "b7cf0d83-f1c9-411c-96fd-c511a4cfa86d".to_string(),
            name: "Testers".to_string(),
            name_match: None,
        };
        let events = Modifier::Groups {
            groups: vec![group.clone()],
            modification: GroupModification::Add,
        }
        .apply(&mut contact);
        assert_eq!(1, events.len());
        assert!(contact.in_group(&group.uuid));

        let events = Modifier::Urn { urn: Urn("tel:+12065551212".to_string()) }.apply(&mut contact);
        assert_eq!(1, events.len());
        assert_eq!(1, contact.urns.len());
    }
}
