//! Resumes continue a waiting session: a new incoming message, or the
//! host reporting that the wait's timeout has passed.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::contact::Contact;
use super::MsgIn;

/// External input continuing a waiting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resume {
    Msg(MsgResume),
    WaitTimeout(WaitTimeoutResume),
}

/// An incoming message ending a msg wait. May carry a fresher version of
/// the contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgResume {
    pub msg: MsgIn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    pub resumed_on: DateTime<FixedOffset>,
}

/// The wait's timeout passed without input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitTimeoutResume {
    pub resumed_on: DateTime<FixedOffset>,
}

impl Resume {
    pub fn type_name(&self) -> &'static str {
        match self {
            Resume::Msg(_) => "msg",
            Resume::WaitTimeout(_) => "wait_timeout",
        }
    }

    pub fn contact(&self) -> Option<&Contact> {
        match self {
            Resume::Msg(r) => r.contact.as_ref(),
            Resume::WaitTimeout(_) => None,
        }
    }
}
