// SPDX-License-Identifier: Apache-2.0

use crate::{
    account::{AccountId, ContractHandle},
    client::Receipt,
    value::Value,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::{fmt, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Passed,
    Failed,
    /// The step was disabled.
    Skipped,
    /// An earlier step failed.
    NotRun,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::NotRun => "not run",
        })
    }
}

/// What a passed step produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum StepOutput {
    Deployed(ContractHandle),
    Account(AccountId),
    Receipt(Receipt),
    Value(Value),
    Block(u64),
}

impl fmt::Display for StepOutput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepOutput::Deployed(handle) => write!(f, "deployed at {handle}"),
            StepOutput::Account(account) => write!(f, "sending from {account}"),
            StepOutput::Receipt(receipt) => {
                write!(f, "block {}", receipt.block)?;
                if receipt.output != Value::Unit {
                    write!(f, ", returned {}", receipt.output)?;
                }
                for event in &receipt.events {
                    write!(f, ", {}", event.name)?;
                }
                Ok(())
            }
            StepOutput::Value(value) => write!(f, "{value}"),
            StepOutput::Block(block) => write!(f, "at block {block}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub name: String,
    pub kind: &'static str,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<StepOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl StepReport {
    pub(crate) fn new(name: &str, kind: &'static str, outcome: Outcome) -> Self {
        StepReport {
            name: name.to_owned(),
            kind,
            outcome,
            output: None,
            error: None,
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_run: usize,
}

/// Result of running a scenario, one entry per step in scenario order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub scenario: String,
    pub steps: Vec<StepReport>,
    /// Handles of the contracts deployed during the run, by binding.
    pub deployments: IndexMap<String, ContractHandle>,
}

impl Report {
    pub fn summary(&self) -> Summary {
        self.steps
            .iter()
            .fold(Summary::default(), |mut summary, step| {
                match step.outcome {
                    Outcome::Passed => summary.passed += 1,
                    Outcome::Failed => summary.failed += 1,
                    Outcome::Skipped => summary.skipped += 1,
                    Outcome::NotRun => summary.not_run += 1,
                }
                summary
            })
    }

    /// True when no step failed.
    pub fn success(&self) -> bool {
        self.first_failure().is_none()
    }

    pub fn first_failure(&self) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.outcome == Outcome::Failed)
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "scenario {}", self.scenario)?;

        let width = self.steps.iter().map(|s| s.name.len()).max().unwrap_or(0);

        for step in &self.steps {
            write!(f, "  {:<width$}  {:<8}", step.name, step.outcome.to_string())?;

            if let Some(output) = &step.output {
                write!(f, "  {output}")?;
            }

            if let Some(error) = &step.error {
                write!(f, "  {error}")?;
            }

            writeln!(f)?;
        }

        let summary = self.summary();

        write!(
            f,
            "{} passed, {} failed, {} skipped, {} not run",
            summary.passed, summary.failed, summary.skipped, summary.not_run
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> Report {
        let handle = ContractHandle::from_bytes([0x11; 20]);
        let mut deploy = StepReport::new("deploy", "deploy", Outcome::Passed);
        deploy.output = Some(StepOutput::Deployed(handle));
        let mut follow = StepReport::new("follow", "action", Outcome::Failed);
        follow.error = Some("'Follow' reverted: deposit of 100 required".into());

        Report {
            scenario: "randao".into(),
            steps: vec![
                deploy,
                follow,
                StepReport::new("commit", "action", Outcome::Skipped),
                StepReport::new("reveal", "action", Outcome::NotRun),
            ],
            deployments: IndexMap::from([("randao".to_owned(), handle)]),
        }
    }

    #[test]
    fn summary_and_failure() {
        let report = report();

        assert_eq!(
            report.summary(),
            Summary {
                passed: 1,
                failed: 1,
                skipped: 1,
                not_run: 1
            }
        );
        assert!(!report.success());
        assert_eq!(report.first_failure().unwrap().name, "follow");
        assert_eq!(report.step("commit").unwrap().outcome, Outcome::Skipped);
    }

    #[test]
    fn text_table() {
        let text = report().to_string();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "scenario randao");
        assert!(lines[1].starts_with("  deploy  passed    deployed at 0x"));
        assert!(lines[2].ends_with("'Follow' reverted: deposit of 100 required"));
        assert_eq!(lines[4], "  reveal  not run ");
        assert_eq!(lines[5], "1 passed, 1 failed, 1 skipped, 1 not run");
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(report()).unwrap();

        assert_eq!(json["steps"][0]["outcome"], "passed");
        assert_eq!(json["steps"][0]["output"]["type"], "deployed");
        assert_eq!(json["steps"][3]["outcome"], "not-run");
        assert!(json["steps"][2].get("output").is_none());
        assert!(json["deployments"]["randao"].is_string());
    }
}
