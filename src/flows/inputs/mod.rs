//! Inputs: the external stimulus a session is currently working with,
//! exposed to expressions as `@input`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::contact::Urn;
use super::{ChannelRef, InputUuid, MsgIn};
use crate::envs::Environment;
use crate::excellent::types::{Object, Value};

/// The session's current input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Input {
    Msg(MsgInput),
}

/// An incoming message as input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgInput {
    pub uuid: InputUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<Urn>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    pub created_on: DateTime<FixedOffset>,
}

impl Input {
    /// Wraps an incoming message as the session input.
    pub fn from_msg(env: &Environment, msg: &MsgIn) -> Input {
        Input::Msg(MsgInput {
            uuid: msg.uuid.clone(),
            channel: msg.channel.clone(),
            urn: msg.urn.clone().map(Urn),
            text: msg.text.clone(),
            attachments: msg.attachments.clone(),
            created_on: env.now(),
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Input::Msg(_) => "msg",
        }
    }

    /// Materializes this input for expression evaluation. The default form
    /// is the text plus any attachments, one per line.
    pub fn to_context(&self, _env: &Environment) -> Value {
        match self {
            Input::Msg(msg) => {
                let mut parts = vec![msg.text.clone()];
                parts.extend(msg.attachments.iter().cloned());

                Value::Object(
                    Object::new("input")
                        .with("type", Value::text("msg"))
                        .with("uuid", Value::text(&msg.uuid))
                        .with("created_on", Value::DateTime(msg.created_on))
                        .with(
                            "channel",
                            match &msg.channel {
                                Some(ch) => Value::Object(
                                    Object::new("channel")
                                        .with("uuid", Value::text(&ch.uuid))
                                        .with("name", Value::text(&ch.name))
                                        .with_default(Value::text(&ch.name)),
                                ),
                                None => Value::Nil,
                            },
                        )
                        .with(
                            "urn",
                            msg.urn.as_ref().map(|u| Value::text(u.as_str())).unwrap_or(Value::Nil),
                        )
                        .with("text", Value::text(&msg.text))
                        .with(
                            "attachments",
                            Value::Array(msg.attachments.iter().map(Value::text).collect()),
                        )
                        .with_default(Value::text(parts.join("\n"))),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{Clock, EnvironmentBuilder};

    #[test]
    fn test_context() {
        let at = DateTime::parse_from_rfc3339("2018-10-18T14:20:30Z").unwrap();
        let env = EnvironmentBuilder::new().with_clock(Clock::Fixed(at)).build();

        let mut msg = MsgIn::new("f51f0a92-b1b6-4de1-b5e5-b431dbee5597".to_string(), "Hi there");
        msg.attachments = vec!["image/jpeg:http://example.com/test.jpg".to_string()];

        let input = Input::from_msg(&env, &msg);
        let ctx = input.to_context(&env);

        assert_eq!(
            "Hi there\nimage/jpeg:http://example.com/test.jpg",
            ctx.to_text(&env).unwrap()
        );

        let round_tripped: Input =
            serde_json::from_str(&serde_json::to_string(&input).unwrap()).unwrap();
        assert_eq!(input, round_tripped);
    }
}
