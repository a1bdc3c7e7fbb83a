//! Shared fixtures for engine tests: an asset set with flows covering the
//! interesting shapes (questions with waits, sub-flows, loops) and helpers
//! for building deterministic environments and sessions.

use std::collections::HashMap;
use std::sync::Arc;

use cadence::assets::SessionAssets;
use cadence::envs::{Clock, Country, EnvironmentBuilder, Language, RngSource, UuidSource};
use cadence::flows::contact::{Contact, Urn};
use cadence::flows::triggers::{ManualTrigger, Trigger};
use cadence::flows::FlowRef;
use cadence::Environment;

pub const TWO_QUESTIONS: &str = "615b8a0f-588c-4d20-a05f-363b0b4ce6f4";
pub const PARENT_FLOW: &str = "50c3706e-fedb-42c0-8eab-dda3335714b7";
pub const CHILD_FLOW: &str = "b7cf0d83-f1c9-411c-96fd-c511a4cfa86d";
pub const LOOP_FLOW: &str = "e6db7c3f-7f85-4a7c-9a5e-9a1c6dbe9d3c";

pub fn assets_json() -> String {
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
            {"uuid": "1e1ce1e1-9288-4504-869e-022d1003c72a", "name": "Testers"}
        ],
        "fields": [
            {"key": "gender", "name": "Gender", "value_type": "text"}
        ],
        "flows": [
            {
                "uuid": "615b8a0f-588c-4d20-a05f-363b0b4ce6f4",
                "name": "Two Questions",
                "language": "eng",
                "type": "messaging",
                "localization": {
                    "fra": {
                        "a9a1bd85-9358-4a1c-a6b5-bb9a89e3b1f5": {
                            "text": ["Rouge! Quelle est votre soda préféré? (pepsi/coke)"]
                        }
                    }
                },
                "nodes": [
                    {
                        "uuid": "46d51f50-58de-49da-8d13-dadbf322685d",
                        "actions": [
                            {
                                "uuid": "a58be63b-907d-4a1a-856b-0bb5579d7507",
                                "type": "send_msg",
                                "text": "Hi @contact.name! What is your favorite color? (red/blue)"
                            }
                        ],
                        "wait": {"type": "msg"},
                        "router": {
                            "type": "switch",
                            "operand": "@input.text",
                            "result_name": "Favorite Color",
                            "cases": [
                                {
                                    "uuid": "5d6abc80-39e7-4620-9988-a2447bffe526",
                                    "type": "has_any_word",
                                    "arguments": ["red"],
                                    "exit_uuid": "37d8813f-1402-4ad2-9cc2-e9054a96525b"
                                },
                                {
                                    "uuid": "0a8c2e49-a4c5-4b18-9d24-7e3fdf99ef84",
                                    "type": "has_any_word",
                                    "arguments": ["blue"],
                                    "exit_uuid": "8e64b588-d46e-4016-a5ef-59cf4d9d7a5b"
                                }
                            ],
                            "default_exit_uuid": "0680b01f-ba0b-48f4-a688-d2f963130126"
                        },
                        "exits": [
                            {
                                "uuid": "37d8813f-1402-4ad2-9cc2-e9054a96525b",
                                "name": "Red",
                                "destination_uuid": "11a772f3-3ca2-4429-8b33-20fdcfc2b69e"
                            },
                            {
                                "uuid": "8e64b588-d46e-4016-a5ef-59cf4d9d7a5b",
                                "name": "Blue",
                                "destination_uuid": "11a772f3-3ca2-4429-8b33-20fdcfc2b69e"
                            },
                            {
                                "uuid": "0680b01f-ba0b-48f4-a688-d2f963130126",
                                "name": "Other",
                                "destination_uuid": "46d51f50-58de-49da-8d13-dadbf322685d"
                            }
                        ]
                    },
                    {
                        "uuid": "11a772f3-3ca2-4429-8b33-20fdcfc2b69e",
                        "actions": [
                            {
                                "uuid": "3248a064-bc42-4dff-aa0f-93d85de2f600",
                                "type": "set_contact_language",
                                "language": "fra"
                            },
                            {
                                "uuid": "a9a1bd85-9358-4a1c-a6b5-bb9a89e3b1f5",
                                "type": "send_msg",
                                "text": "Red it is! What is your favorite soda? (pepsi/coke)"
                            }
                        ],
                        "wait": {"type": "msg"},
                        "router": {
                            "type": "switch",
                            "operand": "@input.text",
                            "result_name": "Soda",
                            "cases": [
                                {
                                    "uuid": "63f8fbc9-fcc2-4a94-bcb5-99a9fb0c06d7",
                                    "type": "has_any_word",
                                    "arguments": ["pepsi"],
                                    "exit_uuid": "cea4afbf-1a7d-4bc5-b9ba-bf22de309e5e"
                                },
                                {
                                    "uuid": "e72a417a-2d4f-44c4-ac3b-142b8f7216f3",
                                    "type": "has_any_word",
                                    "arguments": ["coke"],
                                    "exit_uuid": "40c5c3c6-5f74-4ed1-9197-ea7d1d77ba71"
                                }
                            ],
                            "default_exit_uuid": "0c1bf7b5-1a8e-47d5-9a5a-cf2a2b1c9b92"
                        },
                        "exits": [
                            {
                                "uuid": "cea4afbf-1a7d-4bc5-b9ba-bf22de309e5e",
                                "name": "Pepsi",
                                "destination_uuid": "ddd37cd9-133c-48b6-baa2-916e80f8e664"
                            },
                            {
                                "uuid": "40c5c3c6-5f74-4ed1-9197-ea7d1d77ba71",
                                "name": "Coke",
                                "destination_uuid": "ddd37cd9-133c-48b6-baa2-916e80f8e664"
                            },
                            {
                                "uuid": "0c1bf7b5-1a8e-47d5-9a5a-cf2a2b1c9b92",
                                "name": "Other",
                                "destination_uuid": "11a772f3-3ca2-4429-8b33-20fdcfc2b69e"
                            }
                        ]
                    },
                    {
                        "uuid": "ddd37cd9-133c-48b6-baa2-916e80f8e664",
                        "actions": [
                            {
                                "uuid": "5508e6a7-26ce-4b90-b344-4b17ba33f521",
                                "type": "send_msg",
                                "text": "Great, you are done!"
                            }
                        ],
                        "exits": []
                    }
                ]
            },
            {
                "uuid": "50c3706e-fedb-42c0-8eab-dda3335714b7",
                "name": "Registration",
                "language": "eng",
                "type": "messaging",
                "nodes": [
                    {
                        "uuid": "72a1f5df-49f9-45df-94c9-d86f7ea064e5",
                        "actions": [
                            {
                                "uuid": "9487a60e-a6ef-4a88-b35d-894bfe074144",
                                "type": "enter_flow",
                                "flow": {
                                    "uuid": "b7cf0d83-f1c9-411c-96fd-c511a4cfa86d",
                                    "name": "Collect Age"
                                }
                            }
                        ],
                        "exits": [
                            {
                                "uuid": "d7a36118-0a38-4b35-a7e4-ae89042f0d3c",
                                "destination_uuid": "3dcccbb4-d29c-41dd-a01f-16d814c9ab82"
                            }
                        ]
                    },
                    {
                        "uuid": "3dcccbb4-d29c-41dd-a01f-16d814c9ab82",
                        "actions": [
                            {
                                "uuid": "f01d693b-2af2-49fb-9e38-146eb00937e9",
                                "type": "send_msg",
                                "text": "Thanks @child.results.age, we are all done!"
                            }
                        ],
                        "exits": []
                    }
                ]
            },
            {
                "uuid": "b7cf0d83-f1c9-411c-96fd-c511a4cfa86d",
                "name": "Collect Age",
                "language": "eng",
                "type": "messaging",
                "nodes": [
                    {
                        "uuid": "d9dba561-b5ee-4f62-ba44-60c4dc242b84",
                        "actions": [
                            {
                                "uuid": "4f01993b-e2d1-4b08-9f0e-e32a20bed0b9",
                                "type": "set_run_result",
                                "name": "Age",
                                "value": "23",
                                "category": "Youth"
                            }
                        ],
                        "exits": []
                    }
                ]
            },
            {
                "uuid": "e6db7c3f-7f85-4a7c-9a5e-9a1c6dbe9d3c",
                "name": "Endless Loop",
                "language": "eng",
                "type": "messaging",
                "nodes": [
                    {
                        "uuid": "8b51f09b-9663-4897-a659-8d9e4e01db44",
                        "exits": [
                            {
                                "uuid": "52b51b6c-8e12-4bb7-a1b9-a5a2e3e7a1f4",
                                "destination_uuid": "9e4e8b88-4e6e-4f41-9b65-4b2e3a3c4df5"
                            }
                        ]
                    },
                    {
                        "uuid": "9e4e8b88-4e6e-4f41-9b65-4b2e3a3c4df5",
                        "exits": [
                            {
                                "uuid": "a2c51b10-5cc9-4dcf-8e2b-6f2e1c5a26a8",
                                "destination_uuid": "8b51f09b-9663-4897-a659-8d9e4e01db44"
                            }
                        ]
                    }
                ]
            }
        ]
    }"#
    .to_string()
}

pub fn test_assets() -> Arc<SessionAssets> {
    SessionAssets::from_json(&assets_json()).expect("test assets should be readable")
}

/// An environment with a pinned clock, seeded UUIDs and seeded randomness
/// so whole sprints are reproducible.
pub fn test_environment() -> Environment {
    EnvironmentBuilder::new()
        .with_clock(Clock::Fixed("2018-10-18T14:20:30.123456Z".parse().unwrap()))
        .with_uuids(UuidSource::seeded())
        .with_rng(RngSource::seeded(1234))
        .with_default_country(Country("US".to_string()))
        .with_allowed_languages(vec![
            Language::parse("eng").unwrap(),
            Language::parse("fra").unwrap(),
        ])
        .build()
}

pub fn test_contact() -> Contact {
    Contact {
        uuid: "5d76d86b-3bb9-4d5a-b822-c9d86f5d8e4f".to_string(),
        id: Some(1234),
        name: Some("Ben Haggerty".to_string()),
        language: Some(Language::parse("eng").unwrap()),
        timezone: None,
        created_on: "2018-01-01T12:00:00Z".parse().unwrap(),
        urns: vec![Urn("tel:+12065551212".to_string())],
        groups: vec![],
        fields: HashMap::new(),
    }
}

pub fn manual_trigger(flow_uuid: &str, flow_name: &str) -> Trigger {
    Trigger::Manual(ManualTrigger {
        flow: FlowRef { uuid: flow_uuid.to_string(), name: flow_name.to_string() },
        contact: Some(test_contact()),
        params: None,
        triggered_on: "2018-10-18T14:20:30Z".parse().unwrap(),
    })
}

/// The event type names of a sprint, in emission order.
pub fn event_types(sprint: &cadence::Sprint) -> Vec<&'static str> {
    sprint.events.iter().map(|e| e.type_name()).collect()
}
