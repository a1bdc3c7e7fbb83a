//! The immutable asset store a session executes against: flows, groups,
//! fields, labels, channels and the location hierarchy. Assets are
//! shared-read; the engine never mutates them, so one store can back many
//! sessions running in parallel. Fetching assets over HTTP, caching and
//! invalidation are host concerns.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::envs::LocationHierarchy;
use crate::flows::definition::Flow;
use crate::flows::{ChannelRef, ChannelUuid, FieldKey, FlowUuid, GroupUuid, LabelUuid};

/// A contact group asset. Groups with a query are dynamic: membership is
/// managed by the host, not by flow actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub uuid: GroupUuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Group {
    pub fn is_dynamic(&self) -> bool {
        self.query.is_some()
    }
}

/// A contact field asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub key: FieldKey,
    pub name: String,
    #[serde(default, rename = "value_type")]
    pub value_type: Option<String>,
}

/// A message label asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub uuid: LabelUuid,
    pub name: String,
}

/// A channel asset for sending and receiving messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub uuid: ChannelUuid,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Channel {
    pub fn reference(&self) -> ChannelRef {
        ChannelRef { uuid: self.uuid.clone(), name: self.name.clone() }
    }

    pub fn supports_scheme(&self, scheme: &str) -> bool {
        self.schemes.iter().any(|s| s == scheme)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Default, Deserialize)]
struct AssetsEnvelope {
    #[serde(default)]
    flows: Vec<Flow>,
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    fields: Vec<Field>,
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    labels: Vec<Label>,
    #[serde(default)]
    locations: Option<LocationHierarchy>,
}

/// Everything a session needs to run. Built once and shared.
#[derive(Debug)]
pub struct SessionAssets {
    flows: Vec<Flow>,
    flow_map: HashMap<FlowUuid, usize>,
    channels: Vec<Channel>,
    fields: Vec<Field>,
    groups: Vec<Group>,
    labels: Vec<Label>,
    locations: Option<Arc<LocationHierarchy>>,
}

impl SessionAssets {
    /// Reads an asset store from a single JSON document.
    pub fn from_json(data: &str) -> Result<Arc<SessionAssets>> {
        let envelope: AssetsEnvelope =
            serde_json::from_str(data).context("unable to read assets")?;

        let flow_map = envelope
            .flows
            .iter()
            .enumerate()
            .map(|(i, flow)| (flow.uuid.clone(), i))
            .collect();

        Ok(Arc::new(SessionAssets {
            flows: envelope.flows,
            flow_map,
            channels: envelope.channels,
            fields: envelope.fields,
            groups: envelope.groups,
            labels: envelope.labels,
            locations: envelope.locations.map(Arc::new),
        }))
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn get_flow(&self, uuid: &FlowUuid) -> Result<&Flow> {
        self.flow_map
            .get(uuid)
            .map(|&i| &self.flows[i])
            .ok_or_else(|| anyhow!("unable to find flow with UUID '{uuid}'"))
    }

    pub fn get_group(&self, uuid: &GroupUuid) -> Option<&Group> {
        self.groups.iter().find(|g| g.uuid == *uuid)
    }

    pub fn find_group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name.eq_ignore_ascii_case(name))
    }

    pub fn get_field(&self, key: &FieldKey) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == *key)
    }

    pub fn get_label(&self, uuid: &LabelUuid) -> Option<&Label> {
        self.labels.iter().find(|l| l.uuid == *uuid)
    }

    pub fn get_channel(&self, uuid: &ChannelUuid) -> Option<&Channel> {
        self.channels.iter().find(|c| c.uuid == *uuid)
    }

    /// The first channel able to send to the given URN scheme.
    pub fn channel_for_scheme(&self, scheme: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.supports_scheme(scheme) && c.has_role("send"))
    }

    pub fn has_locations(&self) -> bool {
        self.locations.is_some()
    }

    pub fn locations(&self) -> Option<&Arc<LocationHierarchy>> {
        self.locations.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let assets = SessionAssets::from_json(
            r#"{
                "channels": [
                    {
                        "uuid": "57f1078f-88aa-46f4-a59a-948a5739c03d",
                        "name": "My Android Phone",
                        "address": "+12345671111",
                        "schemes": ["tel"],
                        "roles": ["send", "receive"]
                    }
                ],
                "groups": [
                    {"uuid": "b7cf0d83-f1c9-411c-96fd-c511a4cfa86d", "name": "Testers"}
                ],
                "fields": [
                    {"key": "gender", "name": "Gender", "value_type": "text"}
                ]
            }"#,
        )
        .unwrap();

        assert!(assets.get_group(&"b7cf0d83-f1c9-411c-96fd-c511a4cfa86d".to_string()).is_some());
        assert!(assets.find_group_by_name("testers").is_some());
        assert!(assets.get_field(&"gender".to_string()).is_some());
        assert!(assets.channel_for_scheme("tel").is_some());
        assert!(assets.channel_for_scheme("twitter").is_none());
        assert!(assets.get_flow(&"xxx".to_string()).is_err());
    }
}
