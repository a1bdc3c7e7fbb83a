//! Events are the observable output of the engine: everything a sprint did
//! or wants the host to do. The catalog is open; hosts consume the tagged
//! JSON form.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::contact::Urn;
use super::{ContactRef, FieldRef, FlowRef, GroupRef, MsgIn, MsgOut, NodeUuid};
use crate::envs::Environment;

/// An event with its creation time and typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub created_on: DateTime<FixedOffset>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(env: &Environment, payload: EventPayload) -> Event {
        Event { created_on: env.now(), payload }
    }

    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }
}

/// The payload of each event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// An outgoing message was created and should be delivered by the host.
    MsgCreated { msg: MsgOut },

    /// An incoming message was handled by the session.
    MsgReceived { msg: MsgIn },

    /// The session reached a msg wait and is blocked on external input.
    MsgWait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_on: Option<DateTime<FixedOffset>>,
    },

    /// A wait was ended by a timeout rather than real input.
    WaitTimedOut {},

    /// A result was saved on the current run.
    RunResultChanged {
        name: String,
        value: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        category: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        category_localized: String,
        node_uuid: NodeUuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
    },

    ContactNameChanged {
        #[serde(default)]
        name: String,
    },

    ContactLanguageChanged {
        #[serde(default)]
        language: String,
    },

    ContactFieldChanged {
        field: FieldRef,
        #[serde(default)]
        value: String,
    },

    ContactGroupsAdded { groups: Vec<GroupRef> },

    ContactGroupsRemoved { groups: Vec<GroupRef> },

    ContactUrnAdded { urn: Urn },

    /// A broadcast to other recipients should be created by the host.
    BroadcastCreated {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        urns: Vec<Urn>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        contacts: Vec<ContactRef>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        groups: Vec<GroupRef>,
    },

    EmailSent {
        addresses: Vec<String>,
        subject: String,
        #[serde(default)]
        body: String,
    },

    /// An action asked the host to start sessions for other contacts.
    SessionTriggered {
        flow: FlowRef,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        urns: Vec<Urn>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        contacts: Vec<ContactRef>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        groups: Vec<GroupRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_summary: Option<JsonValue>,
    },

    /// A non-fatal problem: logged and execution continues.
    Error { text: String },

    /// A fatal problem: the current run has errored.
    FatalError { text: String },
}

impl EventPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::MsgCreated { .. } => "msg_created",
            EventPayload::MsgReceived { .. } => "msg_received",
            EventPayload::MsgWait { .. } => "msg_wait",
            EventPayload::WaitTimedOut {} => "wait_timed_out",
            EventPayload::RunResultChanged { .. } => "run_result_changed",
            EventPayload::ContactNameChanged { .. } => "contact_name_changed",
            EventPayload::ContactLanguageChanged { .. } => "contact_language_changed",
            EventPayload::ContactFieldChanged { .. } => "contact_field_changed",
            EventPayload::ContactGroupsAdded { .. } => "contact_groups_added",
            EventPayload::ContactGroupsRemoved { .. } => "contact_groups_removed",
            EventPayload::ContactUrnAdded { .. } => "contact_urn_added",
            EventPayload::BroadcastCreated { .. } => "broadcast_created",
            EventPayload::EmailSent { .. } => "email_sent",
            EventPayload::SessionTriggered { .. } => "session_triggered",
            EventPayload::Error { .. } => "error",
            EventPayload::FatalError { .. } => "fatal_error",
        }
    }
}
