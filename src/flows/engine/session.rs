//! Sessions and the flow execution loop. One call to start or resume runs
//! the session until it waits, completes or errors, producing a sprint of
//! events. There is no async here: waits are data, and a waiting session
//! serializes to JSON and resumes in a later call.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::Engine;
use crate::assets::SessionAssets;
use crate::envs::Environment;
use crate::excellent::{self, types::Object, types::Value, TemplateError};
use crate::flows::contact::Contact;
use crate::flows::definition::{Flow, Node};
use crate::flows::events::{Event, EventPayload};
use crate::flows::inputs::Input;
use crate::flows::modifiers::Modifier;
use crate::flows::resumes::Resume;
use crate::flows::runs::{Run, RunResult, RunSummary};
use crate::flows::triggers::Trigger;
use crate::flows::waits::{Wait, WaitBegun};
use crate::flows::{FlowType, FlowUuid, NodeUuid, RunStatus, SessionStatus};

/// The output of one engine call: the events emitted and the contact
/// modifiers applied, in order.
#[derive(Debug, Default)]
pub struct Sprint {
    pub events: Vec<Event>,
    pub modifiers: Vec<Modifier>,
}

impl Sprint {
    fn new() -> Sprint {
        Sprint::default()
    }
}

// set when an action starts a sub-flow; processed at the top of the loop
#[derive(Debug)]
struct PushedFlow {
    flow_uuid: FlowUuid,
    parent_index: Option<usize>,
    terminal: bool,
}

/// A session holds everything about one contact's passage through one or
/// more flows. It is exclusively owned by the caller; a single session is
/// not safe for concurrent engine calls.
#[derive(Debug)]
pub struct Session {
    assets: Arc<SessionAssets>,

    // state maintained between engine calls
    session_type: FlowType,
    env: Environment,
    trigger: Trigger,
    contact: Option<Contact>,
    runs: Vec<Run>,
    status: SessionStatus,
    wait: Option<Wait>,
    input: Option<Input>,

    // state which is temporary to each call
    pushed_flow: Option<PushedFlow>,
    parent_summary: Option<RunSummary>,
}

#[derive(Serialize, Deserialize)]
struct SessionEnvelope {
    #[serde(rename = "type")]
    session_type: FlowType,
    environment: Environment,
    trigger: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contact: Option<Contact>,
    #[serde(default)]
    runs: Vec<Run>,
    status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wait: Option<Wait>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Input>,
}

impl Session {
    /// Creates a new session for the given trigger. Nothing executes until
    /// the engine's start is called.
    pub fn new(assets: Arc<SessionAssets>, env: Environment, trigger: Trigger) -> Session {
        let contact = trigger.contact().cloned();
        Session {
            assets,
            session_type: FlowType::Messaging,
            env,
            trigger,
            contact,
            runs: Vec::new(),
            status: SessionStatus::Active,
            wait: None,
            input: None,
            pushed_flow: None,
            parent_summary: None,
        }
    }

    /// Restores a session from its serialized form. The runtime parts of
    /// the environment (clock, uuids, rng) may be supplied fresh.
    pub fn read_json(assets: Arc<SessionAssets>, data: &str) -> Result<Session> {
        let envelope: SessionEnvelope =
            serde_json::from_str(data).context("unable to read session")?;

        if envelope.status == SessionStatus::Waiting && envelope.wait.is_none() {
            bail!("session has status of \"waiting\" but no wait object");
        }

        Ok(Session {
            assets,
            session_type: envelope.session_type,
            env: envelope.environment,
            trigger: envelope.trigger,
            contact: envelope.contact,
            runs: envelope.runs,
            status: envelope.status,
            wait: envelope.wait,
            input: envelope.input,
            pushed_flow: None,
            parent_summary: None,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        let envelope = SessionEnvelope {
            session_type: self.session_type,
            environment: self.env.clone(),
            trigger: self.trigger.clone(),
            contact: self.contact.clone(),
            runs: self.runs.clone(),
            status: self.status,
            wait: self.wait.clone(),
            input: self.input.clone(),
        };
        serde_json::to_string(&envelope).context("unable to marshal session")
    }

    pub fn assets(&self) -> &SessionAssets {
        &self.assets
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn set_environment(&mut self, env: Environment) {
        self.env = env;
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn contact(&self) -> Option<&Contact> {
        self.contact.as_ref()
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn wait(&self) -> Option<&Wait> {
        self.wait.as_ref()
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /* ===================== Context ===================== */

    fn run_index_by_uuid(&self, uuid: &str) -> Option<usize> {
        self.runs.iter().position(|r| r.uuid == uuid)
    }

    fn parent_index_of(&self, run_index: usize) -> Option<usize> {
        self.runs[run_index]
            .parent_uuid
            .as_ref()
            .and_then(|uuid| self.run_index_by_uuid(uuid))
    }

    /// The current child of a run: the most recently added run whose parent
    /// is that run.
    fn current_child_of(&self, run_index: usize) -> Option<usize> {
        let uuid = &self.runs[run_index].uuid;
        self.runs
            .iter()
            .rposition(|r| r.parent_uuid.as_deref() == Some(uuid.as_str()))
    }

    // looks through this session's runs for the one that is waiting
    fn waiting_run_index(&self) -> Option<usize> {
        self.runs.iter().position(|r| r.status == RunStatus::Waiting)
    }

    /// Builds the evaluation context for the given run, and the set of top
    /// level names templates may reference.
    fn build_context(&self, run_index: usize) -> (Value, Vec<String>) {
        let run = &self.runs[run_index];
        let mut root = Object::new("map");

        match &self.contact {
            Some(contact) => {
                let contact_ctx = contact.to_context(&self.env);
                if let Value::Object(obj) = &contact_ctx {
                    if let Some(fields) = obj.get("fields") {
                        root.insert("fields", fields.clone());
                    }
                    if let Some(urns) = obj.get("urns") {
                        root.insert("urns", urns.clone());
                    }
                }
                root.insert("contact", contact_ctx);
            }
            None => {
                root.insert("contact", Value::Nil);
                root.insert("fields", Value::Nil);
                root.insert("urns", Value::Nil);
            }
        }

        root.insert("results", run.results.to_context());
        root.insert("run", run.to_context(&self.env));
        root.insert(
            "input",
            self.input
                .as_ref()
                .map(|i| i.to_context(&self.env))
                .unwrap_or(Value::Nil),
        );
        root.insert(
            "child",
            self.current_child_of(run_index)
                .map(|i| self.runs[i].to_summary(self.contact.as_ref()).to_context(&self.env))
                .unwrap_or(Value::Nil),
        );
        root.insert(
            "parent",
            match self.parent_index_of(run_index) {
                Some(i) => self.runs[i].to_summary(self.contact.as_ref()).to_context(&self.env),
                None => self
                    .parent_summary
                    .as_ref()
                    .map(|s| s.to_context(&self.env))
                    .unwrap_or(Value::Nil),
            },
        );
        root.insert("trigger", self.trigger.to_context(&self.env));

        let names = root.keys().cloned().collect();
        (Value::Object(root), names)
    }

    /// Finds the localized text array for an object in a flow, trying the
    /// contact's language before falling back to the native text.
    fn localize(&self, flow: &Flow, uuid: &str, key: &str, native: &[String]) -> Vec<String> {
        if let Some(contact) = &self.contact {
            if let Some(language) = &contact.language {
                let allowed = self.env.allowed_languages.is_empty()
                    || self.env.allowed_languages.contains(language);
                if *language != flow.language && allowed {
                    if let Some(texts) = flow.localization.get_translation(language, uuid, key) {
                        return texts.clone();
                    }
                }
            }
        }
        native.to_vec()
    }

    fn log_event(&mut self, sprint: &mut Sprint, run_index: usize, payload: EventPayload) {
        let event = Event::new(&self.env, payload);
        self.runs[run_index].log_event(event.clone());
        sprint.events.push(event);
    }

    // logs a fatal error event and errors the run
    fn fatal_error(&mut self, sprint: &mut Sprint, run_index: usize, text: String) {
        debug!(run = %self.runs[run_index].uuid, %text, "fatal error");
        self.runs[run_index].exit(&self.env, RunStatus::Errored);
        self.log_event(sprint, run_index, EventPayload::FatalError { text });
    }

    // reads the parent run summary from the trigger if we have one
    fn prepare_for_sprint(&mut self) -> Result<()> {
        if self.parent_summary.is_none() {
            if let Some(summary) = self.trigger.run_summary() {
                let parsed: RunSummary = serde_json::from_value(summary.clone())
                    .context("error reading parent run from trigger")?;
                self.parent_summary = Some(parsed);
            }
        }
        Ok(())
    }
}

/* ===================== Flow execution ===================== */

impl Engine {
    /// Starts the session: validates the triggered flow, then runs until a
    /// wait, completion or error.
    pub fn start(&self, session: &mut Session) -> Result<Sprint> {
        let mut sprint = Sprint::new();

        session.prepare_for_sprint()?;

        let assets = session.assets.clone();
        let flow = assets.get_flow(&session.trigger.flow().uuid)?;
        flow.validate_recursively(&assets)
            .with_context(|| format!("validation failed for flow[uuid={}]", flow.uuid))?;

        session.session_type = flow.flow_type;
        session.pushed_flow = Some(PushedFlow {
            flow_uuid: flow.uuid.clone(),
            parent_index: None,
            terminal: false,
        });

        // off to the races...
        self.continue_until_wait(session, &mut sprint, None, None, true)?;
        Ok(sprint)
    }

    /// Tries to resume a waiting session with the given resume.
    pub fn resume(&self, session: &mut Session, resume: &Resume) -> Result<Sprint> {
        let mut sprint = Sprint::new();

        session.prepare_for_sprint()?;

        if session.status != SessionStatus::Waiting {
            bail!("only waiting sessions can be resumed");
        }

        let waiting = session
            .waiting_run_index()
            .ok_or_else(|| anyhow!("session doesn't contain any runs which are waiting"))?;

        // check the flow is valid and has everything it needs to run
        let assets = session.assets.clone();
        let flow = assets.get_flow(&session.runs[waiting].flow.uuid)?;
        flow.validate_recursively(&assets)
            .with_context(|| format!("validation failed for flow[uuid={}]", flow.uuid))?;

        if let Err(err) = self.try_to_resume(session, &mut sprint, waiting, resume) {
            // if we got an error, add it to the log and shut everything down
            for run in &mut session.runs {
                run.exit(&session.env, RunStatus::Errored);
            }
            session.status = SessionStatus::Errored;
            let event = Event::new(&session.env, EventPayload::Error { text: format!("{err:#}") });
            sprint.events.push(event);
        }

        Ok(sprint)
    }

    fn try_to_resume(
        &self,
        session: &mut Session,
        sprint: &mut Sprint,
        waiting: usize,
        resume: &Resume,
    ) -> Result<()> {
        // check we know where in the flow we began waiting
        session.runs[waiting]
            .current_step()
            .ok_or_else(|| anyhow!("waiting run has no steps"))?;

        let wait = session
            .wait
            .clone()
            .ok_or_else(|| anyhow!("session is waiting but has no wait"))?;

        // try to end our wait, which logs an error if this resume can't
        if let Err(err) = wait.end(resume) {
            session.log_event(sprint, waiting, EventPayload::Error { text: format!("{err:#}") });
            return Ok(());
        }
        session.wait = None;
        session.status = SessionStatus::Active;

        // resumes are allowed to make state changes
        match resume {
            Resume::Msg(msg_resume) => {
                if let Some(contact) = &msg_resume.contact {
                    session.contact = Some(contact.clone());
                }
                session.input = Some(Input::from_msg(&session.env, &msg_resume.msg));
                session.log_event(
                    sprint,
                    waiting,
                    EventPayload::MsgReceived { msg: msg_resume.msg.clone() },
                );
            }
            Resume::WaitTimeout(_) => {
                session.runs[waiting].wait_timed_out = true;
                session.log_event(sprint, waiting, EventPayload::WaitTimedOut {});
            }
        }
        session.runs[waiting].set_status(&session.env, RunStatus::Active);

        let destination = self.find_resume_destination(session, sprint, waiting)?;

        // off to the races again...
        self.continue_until_wait(session, sprint, Some(waiting), destination, false)
    }

    /// Finds the next destination in a run that was waiting or paused for a
    /// child sub-flow, by re-picking the exit of its current node.
    fn find_resume_destination(
        &self,
        session: &mut Session,
        sprint: &mut Sprint,
        run_index: usize,
    ) -> Result<Option<NodeUuid>> {
        if session.runs[run_index].status != RunStatus::Active {
            return Ok(None);
        }

        let assets = session.assets.clone();
        let flow = assets.get_flow(&session.runs[run_index].flow.uuid)?;
        let node_uuid = session.runs[run_index]
            .current_step()
            .map(|s| s.node_uuid.clone())
            .ok_or_else(|| anyhow!("run has no path to resume from"))?;
        let node = flow
            .get_node(&node_uuid)
            .ok_or_else(|| anyhow!("unable to find node {node_uuid}"))?;

        self.pick_node_exit(session, sprint, run_index, flow, node)
    }

    /// The main flow execution loop.
    fn continue_until_wait(
        &self,
        session: &mut Session,
        sprint: &mut Sprint,
        mut current: Option<usize>,
        mut destination: Option<NodeUuid>,
        is_start: bool,
    ) -> Result<()> {
        let mut num_new_steps = 0;
        let mut initialize_run = is_start;

        loop {
            // an action may have started a sub-flow, handle that first
            if let Some(pushed) = session.pushed_flow.take() {
                // a terminal sub-flow interrupts every other run so we never
                // try to resume them
                if pushed.terminal {
                    for run in &mut session.runs {
                        run.exit(&session.env, RunStatus::Interrupted);
                    }
                }

                let assets = session.assets.clone();
                let flow = assets.get_flow(&pushed.flow_uuid)?;
                let parent_uuid = pushed.parent_index.map(|i| session.runs[i].uuid.clone());
                let run = Run::new(&session.env, flow, parent_uuid);
                debug!(run = %run.uuid, flow = %flow.uuid, "starting run");
                session.runs.push(run);
                current = Some(session.runs.len() - 1);

                // our destination is the first node of that flow, if any
                destination = flow.nodes.first().map(|n| n.uuid.clone());
            }

            let current_index = current.ok_or_else(|| anyhow!("session has no current run"))?;

            // with no destination, the current run is done one way or another
            if destination.is_none() {
                if session.runs[current_index].exited_on.is_none() {
                    session.runs[current_index].exit(&session.env, RunStatus::Completed);
                }

                let parent = session.parent_index_of(current_index);
                match parent {
                    Some(parent_index)
                        if session.runs[parent_index].status == RunStatus::Active =>
                    {
                        let child_errored =
                            session.runs[current_index].status == RunStatus::Errored;
                        let child_flow = session.runs[current_index].flow.uuid.clone();
                        current = Some(parent_index);

                        if !child_errored {
                            match self.find_resume_destination(session, sprint, parent_index) {
                                Ok(dest) => destination = dest,
                                Err(_) => {
                                    session.fatal_error(
                                        sprint,
                                        parent_index,
                                        "can't resume run as node no longer exists".to_string(),
                                    );
                                    destination = None;
                                }
                            }
                        } else {
                            // an errored child bubbles up the run hierarchy
                            session.fatal_error(
                                sprint,
                                parent_index,
                                format!(
                                    "child run for flow '{child_flow}' ended in error, ending execution"
                                ),
                            );
                            destination = None;
                        }
                    }
                    _ => {
                        // no active parent, the whole session is done; a run
                        // error bubbles up into the session status
                        session.status =
                            if session.runs[current_index].status == RunStatus::Errored {
                                SessionStatus::Errored
                            } else {
                                SessionStatus::Completed
                            };
                        return Ok(());
                    }
                }
            }

            // if we now have a destination, go there
            if let Some(dest) = destination.clone() {
                num_new_steps += 1;

                if num_new_steps > self.max_steps_per_sprint() {
                    // hitting the step limit is usually a sign of a loop
                    session.fatal_error(
                        sprint,
                        current_index,
                        format!("step limit exceeded, stopping execution before entering '{dest}'"),
                    );
                    destination = None;
                } else {
                    let assets = session.assets.clone();
                    let flow = assets.get_flow(&session.runs[current_index].flow.uuid)?;
                    let node = flow.get_node(&dest).ok_or_else(|| {
                        anyhow!("unable to find destination node {dest} in flow {}", flow.uuid)
                    })?;

                    destination = self.visit_node(
                        session,
                        sprint,
                        current_index,
                        flow,
                        node,
                        initialize_run,
                    )?;
                    initialize_run = false;

                    // if we hit a wait, hand back to the caller
                    if session.status == SessionStatus::Waiting {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Visits the given node, creating a step on the current run's path.
    fn visit_node(
        &self,
        session: &mut Session,
        sprint: &mut Sprint,
        run_index: usize,
        flow: &Flow,
        node: &Node,
        initialize_run: bool,
    ) -> Result<Option<NodeUuid>> {
        debug!(node = %node.uuid, "visiting node");
        let step_index = session.runs[run_index].create_step(&session.env, &node.uuid);

        // a msg trigger seeds the first run with its message as input
        if initialize_run {
            if let Some(msg) = session.trigger.msg().cloned() {
                session.input = Some(Input::from_msg(&session.env, &msg));
                session.log_event(sprint, run_index, EventPayload::MsgReceived { msg });
            }
        }

        // execute our node's actions
        for action in &node.actions {
            let mut ctx = StepContext {
                session: &mut *session,
                sprint: &mut *sprint,
                run_index,
                step_index,
                flow,
            };
            action.execute(&mut ctx).with_context(|| {
                format!(
                    "error executing action[type={}, uuid={}]",
                    action.type_name(),
                    action.uuid()
                )
            })?;

            // check if this action has errored the run
            if session.runs[run_index].status == RunStatus::Errored {
                return Ok(None);
            }
        }

        // an enter_flow action may have started a sub-flow, in which case
        // we're done with this node until the child finishes
        if session.pushed_flow.is_some() {
            return Ok(None);
        }

        // our node might have a wait
        if let Some(wait) = &node.wait {
            let mut wait = wait.clone();

            // the first wait of a msg triggered session is already satisfied
            let skip = session.trigger.msg().is_some()
                && session.runs.len() == 1
                && session.runs[run_index].path.len() == 1;

            if let WaitBegun::Waiting(event) = wait.begin(&session.env, skip) {
                if let Some(payload) = event {
                    session.log_event(sprint, run_index, payload);
                }
                session.runs[run_index].set_status(&session.env, RunStatus::Waiting);
                session.wait = Some(wait);
                session.status = SessionStatus::Waiting;
                return Ok(None);
            }
        }

        // use the node's router (or first exit) to determine where to go
        self.pick_node_exit(session, sprint, run_index, flow, node)
    }

    /// Picks the exit to leave the given node through, saving a result if
    /// the router wants one.
    fn pick_node_exit(
        &self,
        session: &mut Session,
        sprint: &mut Sprint,
        run_index: usize,
        flow: &Flow,
        node: &Node,
    ) -> Result<Option<NodeUuid>> {
        let mut operand: Option<String> = None;
        let mut route = None;
        let mut exit_uuid = None;

        if let Some(router) = &node.router {
            let (context, top_levels) = session.build_context(run_index);
            let mut errors = Vec::new();
            let localize = |uuid: &str, key: &str, native: &[String]| {
                session.localize(flow, uuid, key, native)
            };

            let (picked_operand, picked_route) = router.pick_route(
                &session.env,
                &context,
                &top_levels,
                &localize,
                &node.exits,
                &mut errors,
            );
            operand = picked_operand;
            route = picked_route;

            for text in errors {
                session.log_event(sprint, run_index, EventPayload::Error { text });
            }
            exit_uuid = route.as_ref().map(|r| r.exit_uuid.clone());
        } else if let Some(first) = node.exits.first() {
            // no router, pick our first exit if we have one
            exit_uuid = Some(first.uuid.clone());
        }

        // mark the step as left
        let now = session.env.now();
        if let Some(step) = session.runs[run_index].path.last_mut() {
            step.exit_uuid = exit_uuid.clone();
            step.left_on = Some(now);
        }

        let Some(exit_uuid) = exit_uuid else {
            return Ok(None);
        };
        let exit = node
            .get_exit(&exit_uuid)
            .ok_or_else(|| anyhow!("unable to find exit with UUID '{exit_uuid}'"))?;

        // save a result if the router wants one
        if let (Some(router), Some(route)) = (&node.router, &route) {
            if let Some(result_name) = router.result_name() {
                let localized_name =
                    session.localize(flow, &exit.uuid, "name", &[exit.name().to_string()]);
                let localized_name = localized_name.first().cloned().unwrap_or_default();
                let category_localized =
                    if localized_name == exit.name() { String::new() } else { localized_name };

                let result = RunResult {
                    name: result_name.to_string(),
                    value: route.match_text.clone(),
                    category: exit.name().to_string(),
                    category_localized: category_localized.clone(),
                    node_uuid: node.uuid.clone(),
                    input: operand.clone(),
                    extra: route.extra.clone(),
                    created_on: session.env.now(),
                };
                session.runs[run_index].save_result(&session.env, result);
                session.log_event(
                    sprint,
                    run_index,
                    EventPayload::RunResultChanged {
                        name: result_name.to_string(),
                        value: route.match_text.clone(),
                        category: exit.name().to_string(),
                        category_localized,
                        node_uuid: node.uuid.clone(),
                        input: operand.clone(),
                    },
                );
            }
        }

        Ok(exit.destination_uuid.clone())
    }
}

/* ===================== Step context ===================== */

/// Everything an action needs while executing: the session, the sprint
/// being built, and which run and step it belongs to.
pub struct StepContext<'a> {
    pub(crate) session: &'a mut Session,
    pub(crate) sprint: &'a mut Sprint,
    pub(crate) run_index: usize,
    pub(crate) step_index: usize,
    pub(crate) flow: &'a Flow,
}

impl StepContext<'_> {
    pub fn env(&self) -> &Environment {
        &self.session.env
    }

    pub fn assets(&self) -> &SessionAssets {
        &self.session.assets
    }

    pub fn contact(&self) -> Option<&Contact> {
        self.session.contact.as_ref()
    }

    /// Evaluates a template against this run's context.
    pub fn evaluate_template(&self, template: &str) -> Result<String, TemplateError> {
        let (context, top_levels) = self.session.build_context(self.run_index);
        excellent::evaluate_template(&self.session.env, &context, template, &top_levels)
    }

    /// Evaluates a template to a value against this run's context.
    pub fn evaluate_template_value(&self, template: &str) -> Result<Value, TemplateError> {
        let (context, top_levels) = self.session.build_context(self.run_index);
        excellent::evaluate_template_value(&self.session.env, &context, template, &top_levels)
    }

    /// The localized text for a field on the given object, falling back to
    /// the native text.
    pub fn get_text(&self, uuid: &str, key: &str, native: &str) -> String {
        let localized = self.session.localize(self.flow, uuid, key, &[native.to_string()]);
        localized.into_iter().next().unwrap_or_default()
    }

    pub fn get_text_array(&self, uuid: &str, key: &str, native: &[String]) -> Vec<String> {
        self.session.localize(self.flow, uuid, key, native)
    }

    /// Logs an event to the current run and the sprint.
    pub fn log_event(&mut self, payload: EventPayload) {
        self.session.log_event(self.sprint, self.run_index, payload);
    }

    /// Applies a modifier to the contact, recording it and its events.
    pub fn apply_modifier(&mut self, modifier: Modifier) {
        let Some(contact) = self.session.contact.as_mut() else {
            return;
        };
        let events = modifier.apply(contact);
        self.sprint.modifiers.push(modifier);
        for payload in events {
            self.session.log_event(self.sprint, self.run_index, payload);
        }
    }

    /// Starts a sub-flow; the outer loop will transfer to it once this
    /// node's actions finish.
    pub fn push_flow(&mut self, flow_uuid: FlowUuid, terminal: bool) {
        self.session.pushed_flow = Some(PushedFlow {
            flow_uuid,
            parent_index: Some(self.run_index),
            terminal,
        });
    }

    /// Saves a result on the current run and logs the change.
    pub fn save_result(
        &mut self,
        name: &str,
        value: &str,
        category: &str,
        category_localized: &str,
        input: Option<String>,
        extra: Option<JsonValue>,
    ) {
        let node_uuid = self.session.runs[self.run_index].path[self.step_index].node_uuid.clone();
        let result = RunResult {
            name: name.to_string(),
            value: value.to_string(),
            category: category.to_string(),
            category_localized: category_localized.to_string(),
            node_uuid: node_uuid.clone(),
            input: input.clone(),
            extra,
            created_on: self.session.env.now(),
        };
        self.session.runs[self.run_index].save_result(&self.session.env, result);
        self.session.log_event(
            self.sprint,
            self.run_index,
            EventPayload::RunResultChanged {
                name: name.to_string(),
                value: value.to_string(),
                category: category.to_string(),
                category_localized: category_localized.to_string(),
                node_uuid,
                input,
            },
        );
    }

    /// A frozen JSON summary of the current run, carried by sessions this
    /// one spawns.
    pub fn run_summary_json(&self) -> JsonValue {
        let summary =
            self.session.runs[self.run_index].to_summary(self.session.contact.as_ref());
        serde_json::to_value(&summary).unwrap_or(JsonValue::Null)
    }
}
