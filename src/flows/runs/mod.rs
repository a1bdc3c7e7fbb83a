//! Runs: one execution of one flow inside a session, with its path of
//! steps, saved results and event log.

use chrono::{DateTime, Duration, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::contact::Contact;
use super::definition::Flow;
use super::events::Event;
use super::{ExitUuid, FlowRef, NodeUuid, RunStatus, RunUuid, StepUuid};
use crate::envs::Environment;
use crate::excellent::types::{Object, Value};
use crate::utils::snakify;

/// One visit to one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub uuid: StepUuid,
    pub node_uuid: NodeUuid,
    pub arrived_on: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_on: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_uuid: Option<ExitUuid>,
}

/// A value captured during a run, implicitly by a router or explicitly by
/// a set_run_result action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category_localized: String,
    pub node_uuid: NodeUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<JsonValue>,
    pub created_on: DateTime<FixedOffset>,
}

impl RunResult {
    fn to_context(&self) -> Value {
        Value::Object(
            Object::new("run result")
                .with("name", Value::text(&self.name))
                .with("value", Value::text(&self.value))
                .with("category", Value::text(&self.category))
                .with(
                    "category_localized",
                    if self.category_localized.is_empty() {
                        Value::text(&self.category)
                    } else {
                        Value::text(&self.category_localized)
                    },
                )
                .with(
                    "input",
                    self.input.as_deref().map(Value::text).unwrap_or(Value::Nil),
                )
                .with(
                    "extra",
                    self.extra.as_ref().map(Value::from_json).unwrap_or(Value::Nil),
                )
                .with("node_uuid", Value::text(&self.node_uuid))
                .with("created_on", Value::DateTime(self.created_on))
                .with_default(Value::text(&self.value)),
        )
    }
}

/// Results saved on a run, keyed by the snaked form of their name. Saving
/// under a name that snakes to an existing key overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Results(IndexMap<String, RunResult>);

impl Results {
    pub fn save(&mut self, result: RunResult) {
        self.0.insert(snakify(&result.name), result);
    }

    pub fn get(&self, key: &str) -> Option<&RunResult> {
        self.0.get(&snakify(key))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_context(&self) -> Value {
        let mut obj = Object::dynamic("run results");
        for (key, result) in &self.0 {
            obj.insert(key.clone(), result.to_context());
        }
        Value::Object(obj)
    }
}

/// The minimum information about a run made available to other sessions it
/// spawns, as `@parent` in the child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub uuid: RunUuid,
    pub flow: FlowRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Results::is_empty")]
    pub results: Results,
}

impl RunSummary {
    pub fn to_context(&self, env: &Environment) -> Value {
        let flow = Value::Object(
            Object::new("flow")
                .with("uuid", Value::text(&self.flow.uuid))
                .with("name", Value::text(&self.flow.name))
                .with_default(Value::text(&self.flow.name)),
        );
        let mut obj = Object::new("run")
            .with("uuid", Value::text(&self.uuid))
            .with("flow", flow)
            .with("status", Value::text(status_name(self.status)))
            .with("results", self.results.to_context())
            .with_default(Value::text(&self.uuid));
        if let Some(contact) = &self.contact {
            obj.insert("contact", contact.to_context(env));
        }
        Value::Object(obj)
    }
}

fn status_name(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Active => "active",
        RunStatus::Completed => "completed",
        RunStatus::Waiting => "waiting",
        RunStatus::Errored => "errored",
        RunStatus::Expired => "expired",
        RunStatus::Interrupted => "interrupted",
    }
}

/// One execution of one flow. The session owns all runs in a flat vector;
/// the sub-flow stack is the chain of `parent_uuid` back-pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub uuid: RunUuid,
    pub flow: FlowRef,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Step>,
    #[serde(default, skip_serializing_if = "Results::is_empty")]
    pub results: Results,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<RunUuid>,
    pub created_on: DateTime<FixedOffset>,
    pub modified_on: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_on: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wait_timed_out: bool,
}

impl Run {
    pub fn new(env: &Environment, flow: &Flow, parent_uuid: Option<RunUuid>) -> Run {
        let now = env.now();
        let expires_on = if flow.expire_after_minutes > 0 {
            Some(now + Duration::minutes(flow.expire_after_minutes as i64))
        } else {
            None
        };
        Run {
            uuid: env.new_uuid(),
            flow: flow.reference(),
            status: RunStatus::Active,
            path: Vec::new(),
            results: Results::default(),
            events: Vec::new(),
            parent_uuid,
            created_on: now,
            modified_on: now,
            exited_on: None,
            expires_on,
            wait_timed_out: false,
        }
    }

    /// Appends a new step for arriving at the given node, returning its
    /// index in the path.
    pub fn create_step(&mut self, env: &Environment, node_uuid: &NodeUuid) -> usize {
        let now = env.now();
        self.path.push(Step {
            uuid: env.new_uuid(),
            node_uuid: node_uuid.clone(),
            arrived_on: now,
            left_on: None,
            exit_uuid: None,
        });
        self.modified_on = now;
        self.path.len() - 1
    }

    /// Marks this run as exited with the given status.
    pub fn exit(&mut self, env: &Environment, status: RunStatus) {
        let now = env.now();
        self.status = status;
        self.exited_on = Some(now);
        self.modified_on = now;
    }

    pub fn set_status(&mut self, env: &Environment, status: RunStatus) {
        self.status = status;
        self.modified_on = env.now();
    }

    pub fn save_result(&mut self, env: &Environment, result: RunResult) {
        self.results.save(result);
        self.modified_on = env.now();
    }

    pub fn log_event(&mut self, event: Event) {
        self.modified_on = event.created_on;
        self.events.push(event);
    }

    /// The step the run is currently at, e.g. the one that is waiting.
    pub fn current_step(&self) -> Option<&Step> {
        self.path.last()
    }

    /// Freezes this run into the summary form carried by spawned sessions.
    pub fn to_summary(&self, contact: Option<&Contact>) -> RunSummary {
        RunSummary {
            uuid: self.uuid.clone(),
            flow: self.flow.clone(),
            contact: contact.cloned(),
            status: self.status,
            results: self.results.clone(),
        }
    }

    /// Materializes this run for expression evaluation.
    pub fn to_context(&self, _env: &Environment) -> Value {
        let flow = Value::Object(
            Object::new("flow")
                .with("uuid", Value::text(&self.flow.uuid))
                .with("name", Value::text(&self.flow.name))
                .with_default(Value::text(&self.flow.name)),
        );
        Value::Object(
            Object::new("run")
                .with("uuid", Value::text(&self.uuid))
                .with("flow", flow)
                .with("status", Value::text(status_name(self.status)))
                .with("results", self.results.to_context())
                .with("created_on", Value::DateTime(self.created_on))
                .with(
                    "exited_on",
                    self.exited_on.map(Value::DateTime).unwrap_or(Value::Nil),
                )
                .with("wait_timed_out", Value::Boolean(self.wait_timed_out))
                .with_default(Value::text(&self.uuid)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{Clock, EnvironmentBuilder, UuidSource};

    fn env() -> Environment {
        EnvironmentBuilder::new()
            .with_clock(Clock::Fixed("2018-10-18T14:20:30Z".parse().unwrap()))
            .with_uuids(UuidSource::seeded())
            .build()
    }

    fn result(name: &str, value: &str) -> RunResult {
        RunResult {
            name: name.to_string(),
            value: value.to_string(),
            category: String::new(),
            category_localized: String::new(),
            node_uuid: "f5bb9b7a-7b5e-45c3-8f0e-61b4e95edf03".to_string(),
            input: None,
            extra: None,
            created_on: "2018-10-18T14:20:30Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_results_snaked_keys() {
        let mut results = Results::default();
        results.save(result("Favorite Color", "red"));
        assert!(results.get("favorite_color").is_some());
        assert!(results.get("Favorite Color").is_some());

        // names differing only in case and punctuation overwrite
        results.save(result("favorite-color", "blue"));
        assert_eq!(1, results.len());
        assert_eq!("blue", results.get("favorite_color").unwrap().value);
    }

    #[test]
    fn test_results_context() {
        let environment = env();
        let mut results = Results::default();
        results.save(RunResult {
            category: "Red".to_string(),
            ..result("Favorite Color", "red")
        });

        let ctx = Value::Object(
            crate::excellent::types::Object::new("map").with("results", results.to_context()),
        );
        let names = vec!["results".to_string()];
        let cases = [
            ("@results.favorite_color", "red"),
            ("@results.favorite_color.value", "red"),
            ("@results.favorite_color.category", "Red"),
            ("@results.favorite_color.category_localized", "Red"),
            // results are a dynamic bag, missing ones read as empty
            ("@results.soda", ""),
        ];
        for (template, expected) in cases {
            let text =
                crate::excellent::evaluate_template(&environment, &ctx, template, &names).unwrap();
            assert_eq!(expected, text, "unexpected result for '{template}'");
        }
    }

    #[test]
    fn test_run_lifecycle() {
        let environment = env();
        let flow = Flow::read_json(
            r#"{
                "uuid": "50c3706e-fedb-42c0-8eab-dda3335714b7",
                "name": "Test",
                "language": "eng",
                "type": "messaging",
                "expire_after_minutes": 30,
                "nodes": []
            }"#,
        )
        .unwrap();

        let mut run = Run::new(&environment, &flow, None);
        assert_eq!(RunStatus::Active, run.status);
        assert_eq!(
            "2018-10-18T14:50:30+00:00",
            run.expires_on.unwrap().to_rfc3339()
        );
        assert!(run.exited_on.is_none());

        let step = run.create_step(&environment, &"3dcccbb4-d29c-41dd-a01f-16d814c9ab82".to_string());
        assert_eq!(0, step);
        assert_eq!(1, run.path.len());

        run.exit(&environment, RunStatus::Completed);
        assert!(run.exited_on.is_some());
        assert!(run.status.is_exited());
    }
}
