//! Flow definitions: the directed graph of nodes a session walks. Nodes are
//! held in a flat array with a lazily built uuid lookup table; exits point
//! at destinations by UUID so cyclic graphs need no special handling.

pub mod localization;

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

pub use localization::Localization;

use super::actions::Action;
use super::routers::Router;
use super::waits::Wait;
use super::{ExitUuid, FlowRef, FlowType, FlowUuid, NodeUuid};
use crate::assets::SessionAssets;
use crate::envs::Language;

/// An outgoing edge of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub uuid: ExitUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_uuid: Option<NodeUuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Exit {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// A point in the flow graph: actions to perform, an optional wait, and a
/// router (or default first exit) deciding where to go next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub uuid: NodeUuid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<Router>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<Wait>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exits: Vec<Exit>,
}

impl Node {
    pub fn get_exit(&self, uuid: &ExitUuid) -> Option<&Exit> {
        self.exits.iter().find(|e| e.uuid == *uuid)
    }
}

fn default_spec_version() -> String {
    "12.0".to_string()
}

/// A complete flow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub uuid: FlowUuid,
    pub name: String,
    #[serde(default = "default_spec_version")]
    pub spec_version: String,
    pub language: Language,
    #[serde(rename = "type")]
    pub flow_type: FlowType,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub expire_after_minutes: u64,
    #[serde(default, skip_serializing_if = "Localization::is_empty")]
    pub localization: Localization,
    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(skip)]
    node_map: OnceLock<HashMap<NodeUuid, usize>>,
}

impl Flow {
    /// Reads a single flow definition from JSON.
    pub fn read_json(data: &str) -> Result<Flow> {
        serde_json::from_str(data).context("unable to read flow")
    }

    pub fn reference(&self) -> FlowRef {
        FlowRef { uuid: self.uuid.clone(), name: self.name.clone() }
    }

    pub fn get_node(&self, uuid: &NodeUuid) -> Option<&Node> {
        let map = self.node_map.get_or_init(|| {
            self.nodes
                .iter()
                .enumerate()
                .map(|(i, node)| (node.uuid.clone(), i))
                .collect()
        });
        map.get(uuid).map(|&i| &self.nodes[i])
    }

    /// Checks that this flow is structurally sane: unique UUIDs, exits that
    /// point at real nodes, cases that point at real exits. Performed once
    /// per flow in a session before execution.
    pub fn validate(&self, assets: &SessionAssets) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();

        for node in &self.nodes {
            if !seen.insert(node.uuid.as_str()) {
                bail!("node UUID {} isn't unique", node.uuid);
            }

            for action in &node.actions {
                if !seen.insert(action.uuid()) {
                    bail!("action UUID {} isn't unique", action.uuid());
                }
                action
                    .validate(assets)
                    .with_context(|| format!("validation failed for action[uuid={}, type={}]", action.uuid(), action.type_name()))?;
            }

            for exit in &node.exits {
                if let Some(dest) = &exit.destination_uuid {
                    if self.get_node(dest).is_none() {
                        bail!(
                            "exit {} has destination {} which isn't a node in the flow",
                            exit.uuid,
                            dest
                        );
                    }
                }
            }

            if let Some(router) = &node.router {
                router
                    .validate(&node.exits)
                    .with_context(|| format!("validation failed for router on node[uuid={}]", node.uuid))?;
            }
        }
        Ok(())
    }

    /// Validates this flow and every flow it can enter.
    pub fn validate_recursively(&self, assets: &SessionAssets) -> Result<()> {
        let mut validated: HashSet<FlowUuid> = HashSet::new();
        self.validate_into(assets, &mut validated)
    }

    fn validate_into(&self, assets: &SessionAssets, validated: &mut HashSet<FlowUuid>) -> Result<()> {
        if !validated.insert(self.uuid.clone()) {
            return Ok(());
        }
        self.validate(assets)
            .with_context(|| format!("validation failed for flow[uuid={}]", self.uuid))?;

        for node in &self.nodes {
            for action in &node.actions {
                if let Action::EnterFlow(enter) = action {
                    let child = assets
                        .get_flow(&enter.flow.uuid)
                        .map_err(|_| anyhow!("missing flow dependency '{}'", enter.flow.uuid))?;
                    child.validate_into(assets, validated)?;
                }
            }
        }
        Ok(())
    }
}
