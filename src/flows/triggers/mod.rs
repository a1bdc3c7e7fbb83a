//! Triggers start sessions: manually, from an incoming message, or from an
//! action in another session.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::contact::Contact;
use super::{FlowRef, MsgIn};
use crate::envs::Environment;
use crate::excellent::types::{Object, Value};

/// What started this session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Manual(ManualTrigger),
    Msg(MsgTrigger),
    FlowAction(FlowActionTrigger),
}

/// A user or host explicitly starting a contact on a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualTrigger {
    pub flow: FlowRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
    pub triggered_on: DateTime<FixedOffset>,
}

/// An incoming message matched a flow, e.g. via a keyword. The first msg
/// wait in the session is skipped because this message satisfies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgTrigger {
    pub flow: FlowRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    pub msg: MsgIn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub triggered_on: DateTime<FixedOffset>,
}

/// A start_session action in another session spawned this one. Carries a
/// frozen summary of the run that did so, exposed as `@parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowActionTrigger {
    pub flow: FlowRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    pub run_summary: JsonValue,
    pub triggered_on: DateTime<FixedOffset>,
}

impl Trigger {
    pub fn type_name(&self) -> &'static str {
        match self {
            Trigger::Manual(_) => "manual",
            Trigger::Msg(_) => "msg",
            Trigger::FlowAction(_) => "flow_action",
        }
    }

    pub fn flow(&self) -> &FlowRef {
        match self {
            Trigger::Manual(t) => &t.flow,
            Trigger::Msg(t) => &t.flow,
            Trigger::FlowAction(t) => &t.flow,
        }
    }

    pub fn contact(&self) -> Option<&Contact> {
        match self {
            Trigger::Manual(t) => t.contact.as_ref(),
            Trigger::Msg(t) => t.contact.as_ref(),
            Trigger::FlowAction(t) => t.contact.as_ref(),
        }
    }

    pub fn triggered_on(&self) -> DateTime<FixedOffset> {
        match self {
            Trigger::Manual(t) => t.triggered_on,
            Trigger::Msg(t) => t.triggered_on,
            Trigger::FlowAction(t) => t.triggered_on,
        }
    }

    pub fn msg(&self) -> Option<&MsgIn> {
        match self {
            Trigger::Msg(t) => Some(&t.msg),
            _ => None,
        }
    }

    pub fn params(&self) -> Option<&JsonValue> {
        match self {
            Trigger::Manual(t) => t.params.as_ref(),
            _ => None,
        }
    }

    /// The run summary of the triggering run, for flow_action triggers.
    pub fn run_summary(&self) -> Option<&JsonValue> {
        match self {
            Trigger::FlowAction(t) => Some(&t.run_summary),
            _ => None,
        }
    }

    /// Materializes this trigger for expression evaluation.
    pub fn to_context(&self, _env: &Environment) -> Value {
        let params = self
            .params()
            .map(Value::from_json)
            .unwrap_or(Value::Nil);

        Value::Object(
            Object::new("trigger")
                .with("type", Value::text(self.type_name()))
                .with("params", params)
                .with_default(Value::text(self.type_name())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip() {
        let trigger = Trigger::Manual(ManualTrigger {
            flow: FlowRef {
                uuid: "50c3706e-fedb-42c0-8eab-dda3335714b7".to_string(),
                name: "Registration".to_string(),
            },
            contact: None,
            params: Some(json!({"source": "website"})),
            triggered_on: "2018-10-18T14:20:30Z".parse().unwrap(),
        });

        let marshaled = serde_json::to_value(&trigger).unwrap();
        assert_eq!("manual", marshaled["type"]);
        assert_eq!("Registration", marshaled["flow"]["name"]);

        let read: Trigger = serde_json::from_value(marshaled).unwrap();
        assert_eq!(trigger, read);
    }
}
