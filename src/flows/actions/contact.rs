//! Actions that change the contact. All of them go through modifiers so
//! the change and its events are recorded uniformly.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::super::contact::Urn;
use super::super::engine::StepContext;
use super::super::events::EventPayload;
use super::super::modifiers::{GroupModification, Modifier};
use super::super::{ActionUuid, FieldRef, GroupRef};
use crate::envs::Language;

fn require_contact(ctx: &mut StepContext) -> bool {
    if ctx.contact().is_none() {
        ctx.log_event(EventPayload::Error {
            text: "can't execute action in session without a contact".to_string(),
        });
        return false;
    }
    true
}

fn evaluate_or_log(ctx: &mut StepContext, template: &str) -> Option<String> {
    match ctx.evaluate_template(template) {
        Ok(value) => Some(value),
        Err(err) => {
            ctx.log_event(EventPayload::Error { text: err.to_string() });
            None
        }
    }
}

/// Updates the contact's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetContactNameAction {
    pub uuid: ActionUuid,
    #[serde(default)]
    pub name: String,
}

impl SetContactNameAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        if !require_contact(ctx) {
            return Ok(());
        }
        if let Some(name) = evaluate_or_log(ctx, &self.name) {
            ctx.apply_modifier(Modifier::Name { name: name.trim().to_string() });
        }
        Ok(())
    }
}

/// Updates the contact's preferred language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetContactLanguageAction {
    pub uuid: ActionUuid,
    #[serde(default)]
    pub language: String,
}

impl SetContactLanguageAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        if !require_contact(ctx) {
            return Ok(());
        }
        let template = ctx.get_text(&self.uuid, "language", &self.language);
        let Some(language) = evaluate_or_log(ctx, &template) else {
            return Ok(());
        };
        let language = language.trim().to_string();

        if !language.is_empty() && Language::parse(&language).is_err() {
            ctx.log_event(EventPayload::Error {
                text: format!("language is not valid: {language}"),
            });
            return Ok(());
        }

        ctx.apply_modifier(Modifier::Language { language });
        Ok(())
    }
}

/// Updates one of the contact's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetContactFieldAction {
    pub uuid: ActionUuid,
    pub field: FieldRef,
    #[serde(default)]
    pub value: String,
}

impl SetContactFieldAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        if !require_contact(ctx) {
            return Ok(());
        }
        if let Some(value) = evaluate_or_log(ctx, &self.value) {
            ctx.apply_modifier(Modifier::Field {
                field: self.field.clone(),
                value: value.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Adds the contact to groups. Group references may be fixed UUIDs or name
/// expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddContactGroupsAction {
    pub uuid: ActionUuid,
    pub groups: Vec<GroupRef>,
}

impl AddContactGroupsAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        if !require_contact(ctx) {
            return Ok(());
        }
        let groups = super::resolve_groups(ctx, &self.groups);
        if !groups.is_empty() {
            ctx.apply_modifier(Modifier::Groups { groups, modification: GroupModification::Add });
        }
        Ok(())
    }
}

/// Removes the contact from groups, or from all their groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveContactGroupsAction {
    pub uuid: ActionUuid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all_groups: bool,
}

impl RemoveContactGroupsAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        if !require_contact(ctx) {
            return Ok(());
        }
        let groups = if self.all_groups {
            ctx.contact().map(|c| c.groups.clone()).unwrap_or_default()
        } else {
            super::resolve_groups(ctx, &self.groups)
        };
        if !groups.is_empty() {
            ctx.apply_modifier(Modifier::Groups {
                groups,
                modification: GroupModification::Remove,
            });
        }
        Ok(())
    }
}

/// Adds a URN to the contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddContactUrnAction {
    pub uuid: ActionUuid,
    pub scheme: String,
    pub path: String,
}

impl AddContactUrnAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        if !require_contact(ctx) {
            return Ok(());
        }
        let Some(path) = evaluate_or_log(ctx, &self.path) else {
            return Ok(());
        };
        let path = path.trim();
        if path.is_empty() {
            ctx.log_event(EventPayload::Error {
                text: "URN path evaluated to empty string, skipping".to_string(),
            });
            return Ok(());
        }

        ctx.apply_modifier(Modifier::Urn { urn: Urn(format!("{}:{}", self.scheme, path)) });
        Ok(())
    }
}
