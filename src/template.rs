// SPDX-License-Identifier: Apache-2.0

//! Renders a configuration back into `harness.toml` form, for `new`.

use crate::{
    config::HarnessConfig,
    scenario::{Step, StepKind},
    value::Value,
};
use handlebars::Handlebars;
use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Template(#[from] Box<handlebars::TemplateError>),
    #[error(transparent)]
    Render(#[from] Box<handlebars::RenderError>),
    #[error("step '{0}' has a unit argument, which has no TOML form")]
    Unit(String),
}

const TEMPLATE: &str = r#"# randao-harness configuration
#
# `randao-harness run` reads this file from the current directory. Steps run
# in order; set `enabled = false` to skip one.

[environment]
default_account = {{default_account}}
block = {{block}}
auto_mine = {{auto_mine}}
{{#each accounts}}

[[environment.accounts]]
id = {{id}}
balance = {{balance}}
{{/each}}

[driver]
{{#if step_timeout_ms}}
step_timeout_ms = {{step_timeout_ms}}
{{else}}
# step_timeout_ms = 30000
{{/if}}

[scenario]
name = {{scenario}}
{{#each steps}}

[[scenario.step]]
name = {{name}}
{{#unless enabled}}
enabled = false
{{/unless}}
{{#each fields}}
{{key}} = {{value}}
{{/each}}
{{/each}}
"#;

#[derive(Serialize)]
struct Field {
    key: &'static str,
    value: String,
}

#[derive(Serialize)]
struct StepEntry {
    name: String,
    enabled: bool,
    fields: Vec<Field>,
}

#[derive(Serialize)]
struct AccountEntry {
    id: String,
    balance: String,
}

#[derive(Serialize)]
struct Context {
    default_account: String,
    block: u64,
    auto_mine: bool,
    accounts: Vec<AccountEntry>,
    step_timeout_ms: Option<u64>,
    scenario: String,
    steps: Vec<StepEntry>,
}

fn string(s: &str) -> String {
    toml::Value::String(s.to_owned()).to_string()
}

/// Integers beyond the range of a TOML integer are written as strings.
fn amount(v: u128) -> String {
    if v <= i64::MAX as u128 {
        v.to_string()
    } else {
        format!("\"{v}\"")
    }
}

fn literal(step: &str, value: &Value) -> Result<String, TemplateError> {
    Ok(match value {
        Value::Unit => return Err(TemplateError::Unit(step.to_owned())),
        Value::Bool(v) => v.to_string(),
        Value::Uint(v) if v.bits() < 64 => v.to_string(),
        Value::Uint(v) => format!("\"{v}\""),
        Value::Bytes(v) if v.is_empty() => string("0x"),
        Value::Bytes(v) => format!("[{}]", v.iter().map(|b| format!("{b:#04x}")).join(", ")),
        Value::Str(v) => string(v),
        // quoted, or it would load back as bytes
        Value::List(v) if reads_as_bytes(v) => {
            format!("[{}]", v.iter().map(|e| format!("\"{e}\"")).join(", "))
        }
        Value::List(v) => list(step, v)?,
    })
}

/// A non-empty array of bare integers up to 255 is read as a byte string.
fn reads_as_bytes(elems: &[Value]) -> bool {
    !elems.is_empty()
        && elems
            .iter()
            .all(|e| matches!(e, Value::Uint(v) if v.bits() <= 8))
}

fn list(step: &str, elems: &[Value]) -> Result<String, TemplateError> {
    Ok(format!(
        "[{}]",
        elems
            .iter()
            .map(|e| literal(step, e))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ")
    ))
}

fn args(step: &str, args: &[Value]) -> Result<String, TemplateError> {
    list(step, args)
}

fn step_entry(step: &Step) -> Result<StepEntry, TemplateError> {
    let field = |key, value| Field { key, value };
    let mut fields = vec![field("kind", string(step.kind.name()))];

    match &step.kind {
        StepKind::Deploy { contract, bind } => {
            fields.push(field("contract", string(contract)));
            if let Some(bind) = bind {
                fields.push(field("bind", string(bind)));
            }
        }
        StepKind::SetAccount { account } => {
            fields.push(field("account", string(account.as_str())));
        }
        StepKind::Action {
            target,
            method,
            args: a,
            value,
        } => {
            fields.push(field("target", string(target)));
            fields.push(field("method", string(method)));
            fields.push(field("args", args(&step.name, a)?));
            if *value != 0 {
                fields.push(field("value", amount(*value)));
            }
        }
        StepKind::Const {
            target,
            method,
            args: a,
            expect,
        } => {
            fields.push(field("target", string(target)));
            fields.push(field("method", string(method)));
            fields.push(field("args", args(&step.name, a)?));
            if let Some(expect) = expect {
                fields.push(field("expect", literal(&step.name, expect)?));
            }
        }
        StepKind::AdvanceBlocks { blocks } => {
            fields.push(field("blocks", blocks.to_string()));
        }
    }

    Ok(StepEntry {
        name: string(&step.name),
        enabled: step.enabled,
        fields,
    })
}

/// Render `config` as the text of a `harness.toml` that loads back to it.
pub fn render(config: &HarnessConfig) -> Result<String, TemplateError> {
    let env = &config.environment;

    let context = Context {
        default_account: string(env.default_account.as_str()),
        block: env.block,
        auto_mine: env.auto_mine,
        accounts: env
            .accounts
            .iter()
            .map(|a| AccountEntry {
                id: string(a.id.as_str()),
                balance: amount(a.balance),
            })
            .collect(),
        step_timeout_ms: config.driver.step_timeout_ms,
        scenario: string(&config.scenario.name),
        steps: config
            .scenario
            .steps
            .iter()
            .map(step_entry)
            .collect::<Result<_, _>>()?,
    };

    let mut reg = Handlebars::new();

    reg.set_strict_mode(true);
    reg.register_escape_fn(handlebars::no_escape);
    reg.register_template_string("harness", TEMPLATE)
        .map_err(Box::new)?;

    Ok(reg.render("harness", &context).map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::AccountId,
        scenario::{Scenario, RANDAO_COMMITMENT},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn default_round_trips() {
        let config = HarnessConfig::default();
        let text = render(&config).unwrap();

        assert!(text.contains("[0x26, 0x70, 0x0e, 0x13,"));
        assert!(text.contains("enabled = false"));
        assert!(text.contains("balance = \"1000000000000000000000000\""));
        assert!(text.contains("# step_timeout_ms = 30000"));
        assert_eq!(HarnessConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn every_step_kind_round_trips() {
        let mut config = HarnessConfig::default();
        config.driver.step_timeout_ms = Some(2500);
        config.environment.auto_mine = false;
        config.scenario = Scenario::new("all \"kinds\"")
            .step(Step::deploy("deploy", "randao").bind("r"))
            .step(
                Step::action(
                    "start",
                    "r",
                    "NewCampaign",
                    vec![300u32.into(), 10u32.into(), 20u32.into(), 10u32.into()],
                )
                .with_value(u128::MAX),
            )
            .step(Step::set_account(
                "switch",
                AccountId::new("bob").unwrap(),
            ))
            .step(Step::advance_blocks("wait", 280).disabled())
            .step(
                Step::constant(
                    "hash",
                    "r",
                    "ShaCommit",
                    vec![Value::from(primitive_types::U256::MAX)],
                )
                .expecting(Value::from(RANDAO_COMMITMENT)),
            )
            .step(
                Step::constant("nested", "r", "Whatever", vec![Value::List(vec![
                    true.into(),
                    "text".into(),
                    Value::Bytes(Vec::new()),
                ])])
                .disabled(),
            );

        let text = render(&config).unwrap();

        assert!(text.contains("step_timeout_ms = 2500"));
        assert_eq!(HarnessConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn lists_of_small_integers_stay_lists() {
        let small = Value::List(vec![1u32.into(), 2u32.into()]);
        let bytes = Value::Bytes(vec![1, 2]);

        let mut config = HarnessConfig::default();
        config.scenario = Scenario::new("lists")
            .step(Step::deploy("deploy", "randao"))
            .step(
                Step::constant("pair", "randao", "Pair", vec![1u32.into(), small.clone()])
                    .expecting(small.clone()),
            )
            .step(
                Step::constant("raw", "randao", "Raw", vec![bytes.clone()])
                    .expecting(Value::List(vec![small.clone(), bytes])),
            );

        let text = render(&config).unwrap();

        assert!(text.contains("args = [1, [\"1\", \"2\"]]"));
        assert!(text.contains("expect = [\"1\", \"2\"]"));
        assert!(text.contains("args = [[0x01, 0x02]]"));
        assert_eq!(HarnessConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn unit_arguments_are_rejected() {
        let mut config = HarnessConfig::default();
        config.scenario = Scenario::new("unit")
            .step(Step::deploy("deploy", "randao"))
            .step(Step::constant("read", "randao", "GetRandom", vec![Value::Unit]));

        assert!(matches!(render(&config), Err(TemplateError::Unit(step)) if step == "read"));
    }
}
