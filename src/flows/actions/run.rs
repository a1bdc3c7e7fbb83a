//! Actions that shape the run itself: saving results, entering sub-flows
//! and spawning sessions for other contacts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::super::contact::Urn;
use super::super::engine::StepContext;
use super::super::events::EventPayload;
use super::super::{ActionUuid, ContactRef, FlowRef, GroupRef};
use crate::assets::SessionAssets;

/// Saves a named result on the current run. The value is a template; the
/// optional category is useful for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRunResultAction {
    pub uuid: ActionUuid,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
}

impl SetRunResultAction {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        let value = match ctx.evaluate_template(&self.value) {
            Ok(value) => value,
            Err(err) => {
                ctx.log_event(EventPayload::Error { text: err.to_string() });
                return Ok(());
            }
        };

        let mut category_localized = ctx.get_text(&self.uuid, "category", &self.category);
        if category_localized == self.category {
            category_localized = String::new();
        }

        ctx.save_result(&self.name, &value, &self.category, &category_localized, None, None);
        Ok(())
    }
}

/// Transfers execution to another flow. When the child completes, this run
/// resumes at this node's exit. A terminal enter_flow interrupts every
/// ancestor run instead; the session ends when the child does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnterFlowAction {
    pub uuid: ActionUuid,
    pub flow: FlowRef,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub terminal: bool,
}

impl EnterFlowAction {
    pub fn validate(&self, assets: &SessionAssets) -> Result<()> {
        assets.get_flow(&self.flow.uuid).map(|_| ())
    }

    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        // the flow being missing is fatal, it IS what this action does
        ctx.assets()
            .get_flow(&self.flow.uuid)
            .with_context(|| format!("missing flow '{}'", self.flow.uuid))?;

        ctx.push_flow(self.flow.uuid.clone(), self.terminal);
        Ok(())
    }
}

/// Asks the host to start sessions for other contacts or groups, carrying
/// a snapshot of this run so the spawned session can reference `@parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSessionAction {
    pub uuid: ActionUuid,
    pub flow: FlowRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urns: Vec<Urn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<ContactRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub create_contact: bool,
}

impl StartSessionAction {
    pub fn validate(&self, assets: &SessionAssets) -> Result<()> {
        assets.get_flow(&self.flow.uuid).map(|_| ())?;
        super::validate_groups(assets, &self.groups)
    }

    pub fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        let groups = super::resolve_groups(ctx, &self.groups);
        let run_summary = ctx.run_summary_json();

        ctx.log_event(EventPayload::SessionTriggered {
            flow: self.flow.clone(),
            urns: self.urns.clone(),
            contacts: self.contacts.clone(),
            groups,
            run_summary: Some(run_summary),
        });
        Ok(())
    }
}
