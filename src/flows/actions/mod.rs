//! Actions are the units of work on a node. Each one may evaluate
//! templates, mutate the contact via modifiers, and append events to the
//! sprint. An action returns an error only for problems that should kill
//! the run; anything recoverable is logged as an error event instead.

mod contact;
mod msg;
mod run;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use contact::{
    AddContactGroupsAction, AddContactUrnAction, RemoveContactGroupsAction,
    SetContactFieldAction, SetContactLanguageAction, SetContactNameAction,
};
pub use msg::{SendBroadcastAction, SendEmailAction, SendMsgAction};
pub use run::{EnterFlowAction, SetRunResultAction, StartSessionAction};

use super::engine::StepContext;
use super::events::EventPayload;
use super::GroupRef;
use crate::assets::SessionAssets;

/// An action on a flow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SendMsg(SendMsgAction),
    SendBroadcast(SendBroadcastAction),
    SendEmail(SendEmailAction),
    SetContactName(SetContactNameAction),
    SetContactLanguage(SetContactLanguageAction),
    SetContactField(SetContactFieldAction),
    AddContactGroups(AddContactGroupsAction),
    RemoveContactGroups(RemoveContactGroupsAction),
    AddContactUrn(AddContactUrnAction),
    SetRunResult(SetRunResultAction),
    EnterFlow(EnterFlowAction),
    StartSession(StartSessionAction),
}

impl Action {
    pub fn uuid(&self) -> &str {
        match self {
            Action::SendMsg(a) => &a.uuid,
            Action::SendBroadcast(a) => &a.uuid,
            Action::SendEmail(a) => &a.uuid,
            Action::SetContactName(a) => &a.uuid,
            Action::SetContactLanguage(a) => &a.uuid,
            Action::SetContactField(a) => &a.uuid,
            Action::AddContactGroups(a) => &a.uuid,
            Action::RemoveContactGroups(a) => &a.uuid,
            Action::AddContactUrn(a) => &a.uuid,
            Action::SetRunResult(a) => &a.uuid,
            Action::EnterFlow(a) => &a.uuid,
            Action::StartSession(a) => &a.uuid,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SendMsg(_) => "send_msg",
            Action::SendBroadcast(_) => "send_broadcast",
            Action::SendEmail(_) => "send_email",
            Action::SetContactName(_) => "set_contact_name",
            Action::SetContactLanguage(_) => "set_contact_language",
            Action::SetContactField(_) => "set_contact_field",
            Action::AddContactGroups(_) => "add_contact_groups",
            Action::RemoveContactGroups(_) => "remove_contact_groups",
            Action::AddContactUrn(_) => "add_contact_urn",
            Action::SetRunResult(_) => "set_run_result",
            Action::EnterFlow(_) => "enter_flow",
            Action::StartSession(_) => "start_session",
        }
    }

    /// Checks this action has the assets it needs. Called during flow
    /// validation, before any execution.
    pub fn validate(&self, assets: &SessionAssets) -> Result<()> {
        match self {
            Action::EnterFlow(a) => a.validate(assets),
            Action::StartSession(a) => a.validate(assets),
            Action::AddContactGroups(a) => validate_groups(assets, &a.groups),
            Action::RemoveContactGroups(a) => validate_groups(assets, &a.groups),
            _ => Ok(()),
        }
    }

    /// Runs this action in the context of the current step.
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        match self {
            Action::SendMsg(a) => a.execute(ctx),
            Action::SendBroadcast(a) => a.execute(ctx),
            Action::SendEmail(a) => a.execute(ctx),
            Action::SetContactName(a) => a.execute(ctx),
            Action::SetContactLanguage(a) => a.execute(ctx),
            Action::SetContactField(a) => a.execute(ctx),
            Action::AddContactGroups(a) => a.execute(ctx),
            Action::RemoveContactGroups(a) => a.execute(ctx),
            Action::AddContactUrn(a) => a.execute(ctx),
            Action::SetRunResult(a) => a.execute(ctx),
            Action::EnterFlow(a) => a.execute(ctx),
            Action::StartSession(a) => a.execute(ctx),
        }
    }
}

fn validate_groups(assets: &SessionAssets, refs: &[GroupRef]) -> Result<()> {
    for group in refs {
        if !group.uuid.is_empty() && assets.get_group(&group.uuid).is_none() {
            anyhow::bail!("no such group with UUID '{}'", group.uuid);
        }
    }
    Ok(())
}

/// Resolves group references to concrete groups: fixed UUIDs look up the
/// asset directly, name expressions are evaluated and matched by name.
/// Unresolvable or query-based groups log an error event and are skipped.
fn resolve_groups(ctx: &mut StepContext, refs: &[GroupRef]) -> Vec<GroupRef> {
    let mut resolved = Vec::with_capacity(refs.len());

    for group_ref in refs {
        if !group_ref.uuid.is_empty() {
            let found = ctx
                .assets()
                .get_group(&group_ref.uuid)
                .map(|g| (g.uuid.clone(), g.name.clone(), g.is_dynamic()));
            match found {
                Some((_, name, true)) => {
                    ctx.log_event(EventPayload::Error {
                        text: format!("can't add or remove contacts from query based group '{name}'"),
                    });
                }
                Some((uuid, name, false)) => {
                    resolved.push(GroupRef { uuid, name, name_match: None });
                }
                None => {
                    ctx.log_event(EventPayload::Error {
                        text: format!("no such group with UUID '{}'", group_ref.uuid),
                    });
                }
            }
            continue;
        }

        if let Some(name_match) = &group_ref.name_match {
            let name = match ctx.evaluate_template(name_match) {
                Ok(name) => name,
                Err(err) => {
                    ctx.log_event(EventPayload::Error { text: err.to_string() });
                    continue;
                }
            };
            let found = ctx
                .assets()
                .find_group_by_name(&name)
                .map(|g| (g.uuid.clone(), g.name.clone()));
            match found {
                Some((uuid, name)) => resolved.push(GroupRef { uuid, name, name_match: None }),
                None => {
                    ctx.log_event(EventPayload::Error {
                        text: format!("no such group with name '{name}'"),
                    });
                }
            }
        }
    }
    resolved
}

/// Localizes and evaluates message content: text, attachments and quick
/// replies. Evaluation failures are logged; empty evaluated attachments
/// and quick replies are dropped.
fn evaluate_message(
    ctx: &mut StepContext,
    action_uuid: &str,
    text: &str,
    attachments: &[String],
    quick_replies: &[String],
) -> (String, Vec<String>, Vec<String>) {
    let localized_text = ctx.get_text(action_uuid, "text", text);
    let evaluated_text = match ctx.evaluate_template(&localized_text) {
        Ok(text) => text,
        Err(err) => {
            let text = err.text.clone();
            ctx.log_event(EventPayload::Error { text: err.to_string() });
            text
        }
    };

    let mut evaluate_list = |key: &str, native: &[String], skip_label: &str| -> Vec<String> {
        let localized = ctx.get_text_array(action_uuid, key, native);
        let mut evaluated = Vec::with_capacity(localized.len());
        for item in &localized {
            match ctx.evaluate_template(item) {
                Ok(value) if value.is_empty() => {
                    ctx.log_event(EventPayload::Error {
                        text: format!("{skip_label} text evaluated to empty string, skipping"),
                    });
                }
                Ok(value) => evaluated.push(value),
                Err(err) => {
                    ctx.log_event(EventPayload::Error { text: err.to_string() });
                }
            }
        }
        evaluated
    };

    let evaluated_attachments = evaluate_list("attachments", attachments, "attachment");
    let evaluated_quick_replies = evaluate_list("quick_replies", quick_replies, "quick reply");

    (evaluated_text, evaluated_attachments, evaluated_quick_replies)
}
