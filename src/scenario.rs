// SPDX-License-Identifier: Apache-2.0

//! Ordered, named steps that make up a contract test.

use crate::{
    account::AccountId,
    value::{deserialize_amount, Value},
};
use indexmap::IndexMap;
use serde::{
    de::{self, IgnoredAny},
    Deserialize, Deserializer, Serialize,
};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("step names must not be empty")]
    EmptyName,
    #[error("duplicate step '{0}'")]
    DuplicateStep(String),
    #[error("no step named '{0}'")]
    UnknownStep(String),
    #[error("step '{step}' uses '{target}' before any step deploys it")]
    UnboundTarget { step: String, target: String },
}

fn enabled_by_default() -> bool {
    true
}

fn is_zero(value: &u128) -> bool {
    *value == 0
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepKind {
    /// Deploy `contract`, remembering its handle as `bind` (or the contract
    /// name when unset).
    Deploy {
        contract: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bind: Option<String>,
    },
    /// Send every following call from `account`.
    SetAccount { account: AccountId },
    /// Call a state changing method on the contract bound as `target`.
    Action {
        target: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(
            default,
            deserialize_with = "deserialize_amount",
            skip_serializing_if = "is_zero"
        )]
        value: u128,
    },
    /// Call a read-only method; fails when `expect` is set and differs.
    Const {
        target: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<Value>,
    },
    /// Move the chain forward.
    AdvanceBlocks { blocks: u64 },
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Deploy { .. } => "deploy",
            StepKind::SetAccount { .. } => "set-account",
            StepKind::Action { .. } => "action",
            StepKind::Const { .. } => "const",
            StepKind::AdvanceBlocks { .. } => "advance-blocks",
        }
    }

    /// The binding this step calls into, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            StepKind::Action { target, .. } | StepKind::Const { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Keys a step of this kind may carry besides `name`, `enabled` and
    /// `kind`.
    fn keys(&self) -> &'static [&'static str] {
        match self {
            StepKind::Deploy { .. } => &["contract", "bind"],
            StepKind::SetAccount { .. } => &["account"],
            StepKind::Action { .. } => &["target", "method", "args", "value"],
            StepKind::Const { .. } => &["target", "method", "args", "expect"],
            StepKind::AdvanceBlocks { .. } => &["blocks"],
        }
    }

    /// The binding this step creates, if any.
    pub fn binds(&self) -> Option<&str> {
        match self {
            StepKind::Deploy { contract, bind } => Some(bind.as_deref().unwrap_or(contract)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub name: String,
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// A step as written, with every key seen so misspelled ones can be reported.
#[derive(Deserialize)]
struct StepEntry {
    name: String,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(flatten)]
    kind: StepKind,
    #[serde(flatten)]
    keys: IndexMap<String, IgnoredAny>,
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let StepEntry {
            name,
            enabled,
            kind,
            keys,
        } = StepEntry::deserialize(deserializer)?;

        let allowed = kind.keys();

        if let Some(key) = keys
            .keys()
            .find(|key| *key != "kind" && !allowed.contains(&key.as_str()))
        {
            return Err(de::Error::custom(format!(
                "unknown key `{key}` in step '{name}', expected one of `{}`",
                allowed.join("`, `")
            )));
        }

        Ok(Step {
            name,
            enabled,
            kind,
        })
    }
}

impl Step {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Step {
            name: name.into(),
            enabled: true,
            kind,
        }
    }

    pub fn deploy(name: impl Into<String>, contract: impl Into<String>) -> Self {
        Step::new(
            name,
            StepKind::Deploy {
                contract: contract.into(),
                bind: None,
            },
        )
    }

    pub fn set_account(name: impl Into<String>, account: AccountId) -> Self {
        Step::new(name, StepKind::SetAccount { account })
    }

    pub fn action(
        name: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Step::new(
            name,
            StepKind::Action {
                target: target.into(),
                method: method.into(),
                args,
                value: 0,
            },
        )
    }

    pub fn constant(
        name: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Step::new(
            name,
            StepKind::Const {
                target: target.into(),
                method: method.into(),
                args,
                expect: None,
            },
        )
    }

    pub fn advance_blocks(name: impl Into<String>, blocks: u64) -> Self {
        Step::new(name, StepKind::AdvanceBlocks { blocks })
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Bind a deployed contract under `bind` instead of its contract name.
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        if let StepKind::Deploy { bind: b, .. } = &mut self.kind {
            *b = Some(bind.into());
        }
        self
    }

    /// Attach native currency to an action.
    pub fn with_value(mut self, amount: u128) -> Self {
        if let StepKind::Action { value, .. } = &mut self.kind {
            *value = amount;
        }
        self
    }

    /// Expect a const call to return `expected`.
    pub fn expecting(mut self, expected: impl Into<Value>) -> Self {
        if let StepKind::Const { expect, .. } = &mut self.kind {
            *expect = Some(expected.into());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Scenario {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ScenarioError> {
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| ScenarioError::UnknownStep(name.to_owned()))?;

        step.enabled = enabled;

        Ok(())
    }

    /// Check that step names are unique and that every call targets a
    /// binding created by an earlier deploy step.
    ///
    /// Whether those steps are enabled is not considered here; a call into a
    /// binding whose deploy step was skipped fails when the scenario runs.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut names = HashSet::new();
        let mut bound = HashSet::new();

        for step in &self.steps {
            if step.name.is_empty() {
                return Err(ScenarioError::EmptyName);
            }

            if !names.insert(step.name.as_str()) {
                return Err(ScenarioError::DuplicateStep(step.name.clone()));
            }

            if let Some(target) = step.kind.target() {
                if !bound.contains(target) {
                    return Err(ScenarioError::UnboundTarget {
                        step: step.name.clone(),
                        target: target.to_owned(),
                    });
                }
            }

            if let Some(binding) = step.kind.binds() {
                bound.insert(binding);
            }
        }

        Ok(())
    }
}

/// The account that follows the campaign in the reference scenario.
pub const RANDAO_FOLLOWER: &str = "lax1ghvqzvmpxwarcqhkmd6d5f3lrzept59wvj0feg";

/// Commitment passed to the disabled `Commit` step of the reference scenario.
pub const RANDAO_COMMITMENT: [u8; 32] = [
    0x26, 0x70, 0x0e, 0x13, 0x98, 0x3f, 0xef, 0xbd, 0x9c, 0xf1, 0x6d, 0xa2, 0xed, 0x70, 0xfa, 0x5c,
    0x67, 0x98, 0xac, 0x55, 0x06, 0x2a, 0x48, 0x03, 0x12, 0x1a, 0x86, 0x97, 0x31, 0xe3, 0x08, 0xd2,
];

/// The reference randao scenario: deploy, start a campaign, then follow it
/// from a second account.
///
/// The commit, reveal, random and bounty steps are present but disabled.
/// Their arguments are kept as first written and are not known to be right:
/// `Commit` attaches no deposit, and the chain is never moved into the
/// commit or reveal phase.
pub fn randao() -> Scenario {
    let follower = AccountId::from_static(RANDAO_FOLLOWER);
    let campaign = || Value::from(1u32);

    Scenario::new("randao")
        .step(Step::deploy("deploy", "randao"))
        .step(Step::action(
            "new-campaign",
            "randao",
            "NewCampaign",
            vec![
                Value::from(9200u32),
                Value::from(200000000000u64),
                Value::from(200u32),
                Value::from(100u32),
            ],
        ))
        .step(Step::set_account("change-from", follower))
        .step(Step::action("follow", "randao", "Follow", vec![campaign()]))
        .step(
            Step::action(
                "commit",
                "randao",
                "Commit",
                vec![campaign(), Value::from(RANDAO_COMMITMENT)],
            )
            .disabled(),
        )
        .step(
            Step::action(
                "reveal",
                "randao",
                "Reveal",
                vec![campaign(), Value::from(100u32)],
            )
            .disabled(),
        )
        .step(Step::constant("get-random", "randao", "GetRandom", vec![campaign()]).disabled())
        .step(Step::action("get-my-bounty", "randao", "GetMyBounty", vec![campaign()]).disabled())
        .step(Step::action("refund-bounty", "randao", "RefundBounty", vec![campaign()]).disabled())
}
