//! Waits halt a session pending external input. A wait is plain data: when
//! one begins, the session serializes with it and resumes in a later engine
//! call. Nothing here holds a stack frame.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use super::events::EventPayload;
use super::resumes::Resume;
use crate::envs::Environment;

/// A wait on a node (and, while active, on the session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Wait {
    Msg(MsgWait),
    Nothing(NothingWait),
}

/// Waits for an incoming message, with an optional timeout after which the
/// host may resume the session with a wait_timeout resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MsgWait {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_on: Option<DateTime<FixedOffset>>,
    /// What kind of message the flow is expecting, e.g. an image. A hint to
    /// the channel, not a requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Waits for nothing: the host is expected to resume immediately. Used by
/// surveyor style clients that drive the session themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NothingWait {}

/// The outcome of asking a wait to begin.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitBegun {
    /// The wait declined to happen; execution continues through the node.
    Skipped,
    /// The wait is in effect, with an event to log if it announces itself.
    Waiting(Option<EventPayload>),
}

impl Wait {
    pub fn type_name(&self) -> &'static str {
        match self {
            Wait::Msg(_) => "msg",
            Wait::Nothing(_) => "nothing",
        }
    }

    /// Starts this wait. A msg wait at the very start of a msg-triggered
    /// session skips itself because that message already satisfies it.
    pub fn begin(&mut self, env: &Environment, skip_for_initial_msg: bool) -> WaitBegun {
        match self {
            Wait::Msg(wait) => {
                if skip_for_initial_msg {
                    return WaitBegun::Skipped;
                }
                wait.timeout_on = wait.timeout.map(|secs| env.now() + Duration::seconds(secs));
                WaitBegun::Waiting(Some(EventPayload::MsgWait { timeout_on: wait.timeout_on }))
            }
            Wait::Nothing(_) => WaitBegun::Waiting(None),
        }
    }

    /// Checks that this wait can be ended by the given resume.
    pub fn end(&self, resume: &Resume) -> Result<()> {
        match (self, resume) {
            (Wait::Msg(_), Resume::Msg(_)) => Ok(()),
            (Wait::Msg(wait), Resume::WaitTimeout(_)) => {
                if wait.timeout.is_none() {
                    bail!("wait of type 'msg' has no timeout, can't be ended by resume of type 'wait_timeout'");
                }
                Ok(())
            }
            (Wait::Nothing(_), Resume::Msg(_)) => Ok(()),
            (wait, resume) => bail!(
                "wait of type '{}' can't be ended by resume of type '{}'",
                wait.type_name(),
                resume.type_name()
            ),
        }
    }

    pub fn has_timed_out(&self, env: &Environment) -> bool {
        match self {
            Wait::Msg(wait) => wait.timeout_on.map(|on| on <= env.now()).unwrap_or(false),
            Wait::Nothing(_) => false,
        }
    }
}
