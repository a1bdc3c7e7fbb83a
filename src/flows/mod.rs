//! The flow object model and session engine.

pub mod actions;
pub mod contact;
pub mod definition;
pub mod engine;
pub mod events;
pub mod inputs;
pub mod modifiers;
pub mod resumes;
pub mod routers;
pub mod runs;
pub mod triggers;
pub mod waits;

use serde::{Deserialize, Serialize};

// ids are plain strings; uniqueness is enforced by flow validation
pub type FlowUuid = String;
pub type NodeUuid = String;
pub type ActionUuid = String;
pub type ExitUuid = String;
pub type CaseUuid = String;
pub type RunUuid = String;
pub type StepUuid = String;
pub type GroupUuid = String;
pub type FieldKey = String;
pub type ChannelUuid = String;
pub type LabelUuid = String;
pub type ContactUuid = String;
pub type InputUuid = String;
pub type MsgUuid = String;

/// What kind of sessions a flow can run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Messaging,
    MessagingOffline,
    Voice,
}

/// The state of a session as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Waiting,
    Errored,
}

/// The state of a single run within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Active,
    Completed,
    Waiting,
    Errored,
    Expired,
    Interrupted,
}

impl RunStatus {
    /// Whether a run in this status has finished executing.
    pub fn is_exited(&self) -> bool {
        !matches!(self, RunStatus::Active | RunStatus::Waiting)
    }
}

/* ===================== References ===================== */

/// A pointer to a flow asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRef {
    pub uuid: FlowUuid,
    #[serde(default)]
    pub name: String,
}

/// A pointer to a contact group. Either a fixed UUID or a name expression
/// resolved at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: GroupUuid,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_match: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    pub key: FieldKey,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub uuid: ChannelUuid,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRef {
    pub uuid: ContactUuid,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRef {
    pub uuid: LabelUuid,
    #[serde(default)]
    pub name: String,
}

/* ===================== Messages ===================== */

/// An incoming message, attached to sessions by msg triggers and resumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgIn {
    pub uuid: MsgUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl MsgIn {
    pub fn new(uuid: MsgUuid, text: impl Into<String>) -> Self {
        MsgIn {
            uuid,
            urn: None,
            channel: None,
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// An outgoing message created by a send_msg action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgOut {
    pub uuid: MsgUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
}
