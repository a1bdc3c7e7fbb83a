//! Routers select which exit a session leaves a node through.


use anyhow::{bail, Result};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::definition::Exit;
use super::{CaseUuid, ExitUuid};
use crate::envs::Environment;
use crate::excellent;
use crate::excellent::types::Value;

/// The route a router picked: which exit, the text that matched, and any
/// extra detail (e.g. regex capture groups).
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub exit_uuid: ExitUuid,
    pub match_text: String,
    pub extra: Option<serde_json::Value>,
}

/// A single test to exit rule inside a switch router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub uuid: CaseUuid,
    #[serde(rename = "type")]
    pub test: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub omit_operand: bool,
    pub exit_uuid: ExitUuid,
}

/// A router on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Router {
    Switch(SwitchRouter),
    Random(RandomRouter),
}

/// Evaluates an operand template and walks cases in order; the first test
/// that matches wins its exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchRouter {
    pub operand: String,
    #[serde(default)]
    pub cases: Vec<Case>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_exit_uuid: Option<ExitUuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
}

/// Picks an exit uniformly at random.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomRouter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
}

/// Localizes a translatable text array on an object, e.g. case arguments.
pub type Localizer<'a> = dyn Fn(&str, &str, &[String]) -> Vec<String> + 'a;

impl Router {
    pub fn type_name(&self) -> &'static str {
        match self {
            Router::Switch(_) => "switch",
            Router::Random(_) => "random",
        }
    }

    pub fn result_name(&self) -> Option<&str> {
        match self {
            Router::Switch(r) => r.result_name.as_deref(),
            Router::Random(r) => r.result_name.as_deref(),
        }
    }

    /// Structural checks performed at flow validation time.
    pub fn validate(&self, exits: &[Exit]) -> Result<()> {
        match self {
            Router::Switch(router) => {
                if router.operand.is_empty() {
                    bail!("switch router requires an operand");
                }
                for case in &router.cases {
                    if tests::test_function(&case.test).is_none() {
                        bail!("unknown test '{}' in case {}", case.test, case.uuid);
                    }
                    if !exits.iter().any(|e| e.uuid == case.exit_uuid) {
                        bail!("exit '{}' missing from node", case.exit_uuid);
                    }
                }
                if let Some(default) = &router.default_exit_uuid {
                    if !exits.iter().any(|e| e.uuid == *default) {
                        bail!("exit '{}' missing from node", default);
                    }
                }
                Ok(())
            }
            Router::Random(_) => Ok(()),
        }
    }

    /// Determines the route to take. Evaluation problems are appended to
    /// `errors` for the caller to log as non-fatal error events; they never
    /// abort routing.
    pub fn pick_route(
        &self,
        env: &Environment,
        context: &Value,
        top_levels: &[String],
        localize: &Localizer,
        exits: &[Exit],
        errors: &mut Vec<String>,
    ) -> (Option<String>, Option<Route>) {
        match self {
            Router::Switch(router) => {
                router.pick_route(env, context, top_levels, localize, errors)
            }
            Router::Random(_) => {
                if exits.is_empty() {
                    return (None, None);
                }
                let picked = (env.random_decimal() * rust_decimal::Decimal::from(exits.len()))
                    .floor()
                    .to_usize()
                    .unwrap_or(0)
                    .min(exits.len() - 1);
                let route = Route {
                    exit_uuid: exits[picked].uuid.clone(),
                    match_text: picked.to_string(),
                    extra: None,
                };
                (None, Some(route))
            }
        }
    }
}

impl SwitchRouter {
    fn pick_route(
        &self,
        env: &Environment,
        context: &Value,
        top_levels: &[String],
        localize: &Localizer,
        errors: &mut Vec<String>,
    ) -> (Option<String>, Option<Route>) {
        // evaluate the operand, logging rather than failing on error
        let operand = match excellent::evaluate_template_value(env, context, &self.operand, top_levels)
        {
            Ok(value) => value,
            Err(err) => {
                errors.push(err.to_string());
                Value::Text(err.text)
            }
        };
        let operand_text = operand.to_text(env).ok();

        for case in &self.cases {
            let Some(test) = tests::test_function(&case.test) else {
                errors.push(format!("unknown test '{}', taking no exit", case.test));
                return (operand_text, None);
            };

            // operand first, then the localized and evaluated arguments
            let mut args = Vec::with_capacity(case.arguments.len() + 1);
            if !case.omit_operand {
                args.push(operand.clone());
            }
            let localized = localize(&case.uuid, "arguments", &case.arguments);
            for argument in &localized {
                match excellent::evaluate_template_value(env, context, argument, top_levels) {
                    Ok(value) => args.push(value),
                    Err(err) => {
                        errors.push(err.to_string());
                        args.push(Value::Text(err.text));
                    }
                }
            }

            match test(env, &args) {
                Ok(result) if result.matched => {
                    let match_text = result.match_value.to_text(env).unwrap_or_default();
                    return (
                        operand_text,
                        Some(Route {
                            exit_uuid: case.exit_uuid.clone(),
                            match_text,
                            extra: result.extra,
                        }),
                    );
                }
                Ok(_) => continue,
                Err(err) => {
                    errors.push(format!(
                        "error calling test {}: {}",
                        case.test.to_uppercase(),
                        err.message()
                    ));
                    continue;
                }
            }
        }

        match &self.default_exit_uuid {
            Some(default) => (
                operand_text.clone(),
                Some(Route {
                    exit_uuid: default.clone(),
                    match_text: operand_text.unwrap_or_default(),
                    extra: None,
                }),
            ),
            None => (operand_text, None),
        }
    }
}

#[cfg(test)]
mod router_tests {
    use super::*;
    use crate::excellent::types::Object;

    fn context() -> Value {
        let input = Object::new("input")
            .with("text", Value::text("the number is 42"))
            .with_default(Value::text("the number is 42"));
        Value::Object(Object::new("map").with("input", Value::Object(input)))
    }

    fn no_localization(_uuid: &str, _key: &str, native: &[String]) -> Vec<String> {
        native.to_vec()
    }

    fn number_router() -> Router {
        Router::Switch(SwitchRouter {
            operand: "@input.text".to_string(),
            cases: vec![Case {
                uuid: "5d6abc80-39e7-4620-9988-a2447bffe526".to_string(),
                test: "has_number_between".to_string(),
                arguments: vec!["40".to_string(), "50".to_string()],
                omit_operand: false,
                exit_uuid: "fe76621a-c4cf-4b99-9d51-c85bbbd05f83".to_string(),
            }],
            default_exit_uuid: Some("37d8813f-1402-4ad2-9cc2-e9054a96525b".to_string()),
            result_name: Some("Number".to_string()),
        })
    }

    #[test]
    fn test_switch_routing() {
        let env = crate::envs::EnvironmentBuilder::new().build();
        let ctx = context();
        let names = vec!["input".to_string()];
        let mut errors = Vec::new();

        let (operand, route) =
            number_router().pick_route(&env, &ctx, &names, &no_localization, &[], &mut errors);
        assert!(errors.is_empty());
        assert_eq!(Some("the number is 42".to_string()), operand);
        let route = route.unwrap();
        assert_eq!("fe76621a-c4cf-4b99-9d51-c85bbbd05f83", route.exit_uuid);
        assert_eq!("42", route.match_text);

        // no number in the operand takes the default exit
        let input = Object::new("input")
            .with("text", Value::text("no digits here"))
            .with_default(Value::text("no digits here"));
        let ctx = Value::Object(Object::new("map").with("input", Value::Object(input)));
        let (_, route) =
            number_router().pick_route(&env, &ctx, &names, &no_localization, &[], &mut errors);
        assert_eq!("37d8813f-1402-4ad2-9cc2-e9054a96525b", route.unwrap().exit_uuid);
    }

    #[test]
    fn test_switch_json_round_trip() {
        let router = number_router();
        let marshaled = serde_json::to_value(&router).unwrap();
        assert_eq!("switch", marshaled["type"]);
        assert_eq!("has_number_between", marshaled["cases"][0]["type"]);
        let read: Router = serde_json::from_value(marshaled).unwrap();
        assert_eq!(router, read);
    }
}
