//! Contacts: the person (or thing) a session is communicating with.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::{ChannelRef, ContactUuid, FieldKey, GroupRef, GroupUuid};
use crate::assets::SessionAssets;
use crate::envs::{Environment, Language, RedactionPolicy};
use crate::excellent::types::{Object, Value};

/// A URN like `tel:+12065551212` or `twitterid:54784326227#nyaruka`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(pub String);

impl Urn {
    pub fn scheme(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// The path portion, without any display fragment.
    pub fn path(&self) -> &str {
        let after_scheme = self.0.split_once(':').map(|(_, p)| p).unwrap_or(&self.0);
        after_scheme.split('#').next().unwrap_or(after_scheme)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A destination an outgoing message can be sent to.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub urn: Urn,
    pub channel: Option<ChannelRef>,
}

/// The contact at the center of a session. The session owns this
/// exclusively; actions mutate it through modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub uuid: ContactUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<Tz>,
    pub created_on: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urns: Vec<Urn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupRef>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<FieldKey, String>,
}

impl Contact {
    /// The first word of the contact's name.
    pub fn first_name(&self) -> Option<&str> {
        self.name.as_deref().and_then(|name| name.split_whitespace().next())
    }

    pub fn in_group(&self, uuid: &GroupUuid) -> bool {
        self.groups.iter().any(|g| g.uuid == *uuid)
    }

    pub fn add_group(&mut self, group: GroupRef) -> bool {
        if self.in_group(&group.uuid) {
            return false;
        }
        self.groups.push(group);
        true
    }

    pub fn remove_group(&mut self, uuid: &GroupUuid) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g.uuid != *uuid);
        self.groups.len() != before
    }

    pub fn has_urn(&self, urn: &Urn) -> bool {
        self.urns.iter().any(|u| u.path() == urn.path() && u.scheme() == urn.scheme())
    }

    pub fn add_urn(&mut self, urn: Urn) -> bool {
        if self.has_urn(&urn) {
            return false;
        }
        self.urns.push(urn);
        true
    }

    /// Pairs URNs with channels that can send to them. Without `all_urns`
    /// only the highest priority (first) sendable URN is used.
    pub fn resolve_destinations(&self, assets: &SessionAssets, all_urns: bool) -> Vec<Destination> {
        let mut destinations = Vec::new();
        for urn in &self.urns {
            let channel = assets.channel_for_scheme(urn.scheme());
            if channel.is_some() || all_urns {
                destinations.push(Destination {
                    urn: urn.clone(),
                    channel: channel.map(|c| c.reference()),
                });
                if !all_urns {
                    break;
                }
            }
        }
        destinations
    }

    /// Materializes this contact for expression evaluation.
    pub fn to_context(&self, env: &Environment) -> Value {
        let urn_value = |urn: &Urn| -> Value {
            if env.redaction_policy == RedactionPolicy::Urns {
                Value::text("********")
            } else {
                Value::text(urn.as_str())
            }
        };

        let groups: Vec<Value> = self
            .groups
            .iter()
            .map(|g| {
                Value::Object(
                    Object::new("group")
                        .with("uuid", Value::text(&g.uuid))
                        .with("name", Value::text(&g.name))
                        .with_default(Value::text(&g.name)),
                )
            })
            .collect();

        let mut fields = Object::dynamic("fields");
        for (key, value) in &self.fields {
            fields.insert(key.clone(), Value::text(value));
        }

        let default = match (&self.name, self.urns.first()) {
            (Some(name), _) => Value::text(name),
            (None, Some(urn)) => urn_value(urn),
            (None, None) => Value::text(""),
        };

        let mut obj = Object::new("contact")
            .with("uuid", Value::text(&self.uuid))
            .with("name", self.name.as_deref().map(Value::text).unwrap_or(Value::Nil))
            .with(
                "first_name",
                self.first_name().map(Value::text).unwrap_or(Value::Nil),
            )
            .with(
                "language",
                self.language
                    .as_ref()
                    .map(|l| Value::text(l.as_str()))
                    .unwrap_or(Value::Nil),
            )
            .with("timezone", match &self.timezone {
                Some(tz) => Value::text(tz.name()),
                None => Value::Nil,
            })
            .with("created_on", Value::DateTime(self.created_on))
            .with("urns", Value::Array(self.urns.iter().map(urn_value).collect()))
            .with("urn", self.urns.first().map(urn_value).unwrap_or(Value::Nil))
            .with("groups", Value::Array(groups))
            .with("fields", Value::Object(fields))
            .with_default(default);

        if let Some(id) = self.id {
            obj.insert("id", Value::int(id as i64));
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::EnvironmentBuilder;
    use crate::excellent::{evaluate_template, types::Value};

    fn test_contact() -> Contact {
        Contact {
            uuid: "5d76d86b-3bb9-4d5a-b822-c9d86f5d8e4f".to_string(),
            id: Some(1234),
            name: Some("Ben Haggerty".to_string()),
            language: Some(Language::parse("eng").unwrap()),
            timezone: None,
            created_on: "2018-01-01T12:00:00Z".parse().unwrap(),
            urns: vec![Urn("tel:+12065551212".to_string())],
            groups: vec![GroupRef {
                uuid: "b7cf0d83-f1c9-411c-96fd-c511a4cfa86d".to_string(),
                name: "Testers".to_string(),
                name_match: None,
            }],
            fields: maplit::hashmap! {"gender".to_string() => "Male".to_string()},
        }
    }

    #[test]
    fn test_urn() {
        let urn = Urn("twitterid:54784326227#nyaruka".to_string());
        assert_eq!("twitterid", urn.scheme());
        assert_eq!("54784326227", urn.path());
    }

    #[test]
    fn test_groups() {
        let mut contact = test_contact();
        assert!(contact.in_group(&"b7cf0d83-f1c9-411c-96fd-c511a4cfa86d".to_string()));

        let added = contact.add_group(GroupRef {
            uuid: "1e1ce1e1-9288-4504-869e-022d1003c72a".to_string(),
            name: "Customers".to_string(),
            name_match: None,
        });
        assert!(added);
        assert_eq!(2, contact.groups.len());

        assert!(contact.remove_group(&"1e1ce1e1-9288-4504-869e-022d1003c72a".to_string()));
        assert!(!contact.remove_group(&"1e1ce1e1-9288-4504-869e-022d1003c72a".to_string()));
    }

    #[test]
    fn test_context() {
        let env = EnvironmentBuilder::new().build();
        let contact = test_contact();
        let ctx = Value::Object(
            crate::excellent::types::Object::new("map").with("contact", contact.to_context(&env)),
        );
        let names = vec!["contact".to_string()];

        let cases = [
            ("@contact", "Ben Haggerty"),
            ("@contact.name", "Ben Haggerty"),
            ("@contact.first_name", "Ben"),
            ("@contact.language", "eng"),
            ("@contact.urn", "tel:+12065551212"),
            ("@(contact.groups[0].name)", "Testers"),
            ("@contact.fields.gender", "Male"),
            // fields is a dynamic bag so unset fields read as empty
            ("@contact.fields.age", ""),
        ];
        for (template, expected) in cases {
            let result = evaluate_template(&env, &ctx, template, &names).unwrap();
            assert_eq!(expected, result, "unexpected result for '{template}'");
        }

        // but a property the contact itself doesn't have is an error
        assert!(evaluate_template(&env, &ctx, "@contact.xxx", &names).is_err());
    }
}
