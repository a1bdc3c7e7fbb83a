//! Actions that create outgoing content: messages, broadcasts and emails.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::super::contact::Urn;
use super::super::engine::StepContext;
use super::super::events::EventPayload;
use super::super::{ActionUuid, ContactRef, GroupRef, MsgOut};

/// Replies to the current contact. The text may contain templates. One
/// message is created per sendable destination; with no destination at all
/// a message without a URN is created and the host decides what to do
/// with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMsgAction {
    pub uuid: ActionUuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all_urns: bool,
}

impl SendMsgAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        if ctx.contact().is_none() {
            ctx.log_event(EventPayload::Error {
                text: "can't execute action in session without a contact".to_string(),
            });
            return Ok(());
        }

        let (text, attachments, quick_replies) = super::evaluate_message(
            ctx,
            &self.uuid,
            &self.text,
            &self.attachments,
            &self.quick_replies,
        );

        let destinations = ctx
            .contact()
            .map(|c| c.resolve_destinations(ctx.assets(), self.all_urns))
            .unwrap_or_default();

        if destinations.is_empty() {
            let msg = MsgOut {
                uuid: ctx.env().new_uuid(),
                urn: None,
                channel: None,
                text: text.clone(),
                attachments: attachments.clone(),
                quick_replies: quick_replies.clone(),
            };
            ctx.log_event(EventPayload::MsgCreated { msg });
            return Ok(());
        }

        for destination in destinations {
            let msg = MsgOut {
                uuid: ctx.env().new_uuid(),
                urn: Some(destination.urn.0.clone()),
                channel: destination.channel.clone(),
                text: text.clone(),
                attachments: attachments.clone(),
                quick_replies: quick_replies.clone(),
            };
            ctx.log_event(EventPayload::MsgCreated { msg });
        }
        Ok(())
    }
}

/// Sends a message to recipients beyond the current contact. The engine
/// only emits the event; creating the actual broadcast is up to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendBroadcastAction {
    pub uuid: ActionUuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urns: Vec<Urn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<ContactRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupRef>,
}

impl SendBroadcastAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        let localized = ctx.get_text(&self.uuid, "text", &self.text);
        let text = match ctx.evaluate_template(&localized) {
            Ok(text) => text,
            Err(err) => {
                let text = err.text.clone();
                ctx.log_event(EventPayload::Error { text: err.to_string() });
                text
            }
        };

        let groups = super::resolve_groups(ctx, &self.groups);

        ctx.log_event(EventPayload::BroadcastCreated {
            text,
            urns: self.urns.clone(),
            contacts: self.contacts.clone(),
            groups,
        });
        Ok(())
    }
}

/// Sends an email. Subject and body are templates; newlines are stripped
/// from the evaluated subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendEmailAction {
    pub uuid: ActionUuid,
    pub addresses: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl SendEmailAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        let subject = match ctx.evaluate_template(&self.subject) {
            Ok(subject) => subject.replace(['\n', '\r'], " ").trim().to_string(),
            Err(err) => {
                ctx.log_event(EventPayload::Error { text: err.to_string() });
                return Ok(());
            }
        };
        if subject.is_empty() {
            ctx.log_event(EventPayload::Error {
                text: "email subject evaluated to empty string, skipping".to_string(),
            });
            return Ok(());
        }

        let body = match ctx.evaluate_template(&self.body) {
            Ok(body) => body,
            Err(err) => {
                ctx.log_event(EventPayload::Error { text: err.to_string() });
                return Ok(());
            }
        };

        let mut addresses = Vec::with_capacity(self.addresses.len());
        for address in &self.addresses {
            match ctx.evaluate_template(address) {
                Ok(evaluated) if !evaluated.is_empty() => addresses.push(evaluated),
                Ok(_) => ctx.log_event(EventPayload::Error {
                    text: "email address evaluated to empty string, skipping".to_string(),
                }),
                Err(err) => ctx.log_event(EventPayload::Error { text: err.to_string() }),
            }
        }
        if addresses.is_empty() {
            ctx.log_event(EventPayload::Error {
                text: "email has no valid addresses, skipping".to_string(),
            });
            return Ok(());
        }

        ctx.log_event(EventPayload::EmailSent { addresses, subject, body });
        Ok(())
    }
}
