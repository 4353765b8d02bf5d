// SPDX-License-Identifier: Apache-2.0

//! Runs a scenario against a [`ContractClient`], one step at a time.

use crate::{
    account::{AccountId, ContractHandle},
    client::{CallContext, ClientError, ContractClient, Invocation},
    report::{Outcome, Report, StepOutput, StepReport},
    scenario::{Scenario, Step, StepKind},
    value::Value,
};
use indexmap::IndexMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("no contract is bound as '{0}'")]
    UnboundTarget(String),
    #[error("expected {expected}, got {actual}")]
    Mismatch { expected: Value, actual: Value },
    #[error("step did not finish within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Sender of every call until a set-account step changes it.
    pub account: AccountId,
    /// Give up on a step that takes longer than this.
    pub step_timeout: Option<Duration>,
}

impl DriverOptions {
    pub fn new(account: AccountId) -> Self {
        DriverOptions {
            account,
            step_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Binding {
    contract: String,
    handle: ContractHandle,
}

/// State threaded from one step to the next.
struct RunState {
    account: AccountId,
    bindings: IndexMap<String, Binding>,
}

impl RunState {
    fn invocation(
        &self,
        target: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Invocation, StepError> {
        let binding = self
            .bindings
            .get(target)
            .ok_or_else(|| StepError::UnboundTarget(target.to_owned()))?;

        Ok(Invocation::new(
            binding.contract.as_str(),
            binding.handle,
            method,
            args.to_vec(),
        ))
    }
}

pub struct Driver<C> {
    client: C,
    options: DriverOptions,
}

impl<C: ContractClient> Driver<C> {
    pub fn new(client: C, options: DriverOptions) -> Self {
        Driver { client, options }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    /// Run every step of `scenario` in order.
    ///
    /// Disabled steps are skipped without touching the client. The first
    /// failing step ends the run; the steps after it are reported as not run.
    pub async fn run(&mut self, scenario: &Scenario) -> Report {
        let mut state = RunState {
            account: self.options.account.clone(),
            bindings: IndexMap::new(),
        };
        let mut failed = false;
        let mut steps = Vec::with_capacity(scenario.steps.len());

        info!(scenario = %scenario.name, account = %state.account, "starting scenario");

        for step in &scenario.steps {
            let kind = step.kind.name();

            if !step.enabled {
                info!(step = %step.name, "skipped");
                steps.push(StepReport::new(&step.name, kind, Outcome::Skipped));
                continue;
            }

            if failed {
                steps.push(StepReport::new(&step.name, kind, Outcome::NotRun));
                continue;
            }

            let span = info_span!("step", name = %step.name, kind);
            let timeout = self.options.step_timeout;
            let start = Instant::now();

            let result = {
                let fut = self.execute(&mut state, step).instrument(span.clone());

                match timeout {
                    Some(limit) => tokio::time::timeout(limit, fut)
                        .await
                        .unwrap_or(Err(StepError::Timeout(limit))),
                    None => fut.await,
                }
            };

            let mut report = span.in_scope(|| match result {
                Ok(output) => {
                    let mut report = StepReport::new(&step.name, kind, Outcome::Passed);
                    report.output = Some(output);
                    report
                }
                Err(err) => {
                    warn!("failed: {err}");
                    failed = true;
                    let mut report = StepReport::new(&step.name, kind, Outcome::Failed);
                    report.error = Some(err.to_string());
                    report
                }
            });
            report.elapsed = start.elapsed();
            steps.push(report);
        }

        Report {
            scenario: scenario.name.clone(),
            steps,
            deployments: state
                .bindings
                .into_iter()
                .map(|(name, binding)| (name, binding.handle))
                .collect(),
        }
    }

    async fn execute(
        &mut self,
        state: &mut RunState,
        step: &Step,
    ) -> Result<StepOutput, StepError> {
        match &step.kind {
            StepKind::Deploy { contract, bind } => {
                let ctx = CallContext::new(state.account.clone());
                let handle = self.client.deploy(&ctx, contract).await?;

                info!(%contract, %handle, "deployed");

                let name = bind.as_deref().unwrap_or(contract).to_owned();
                state.bindings.insert(
                    name,
                    Binding {
                        contract: contract.clone(),
                        handle,
                    },
                );

                Ok(StepOutput::Deployed(handle))
            }
            StepKind::SetAccount { account } => {
                info!(from = %state.account, to = %account, "switching account");
                state.account = account.clone();

                Ok(StepOutput::Account(account.clone()))
            }
            StepKind::Action {
                target,
                method,
                args,
                value,
            } => {
                let call = state.invocation(target, method, args)?;
                let ctx = CallContext::new(state.account.clone()).with_value(*value);

                info!(sender = %ctx.sender, value = %ctx.value, "sending {call}");

                let receipt = self.client.send_action(&ctx, &call).await?;

                info!(block = receipt.block, events = receipt.events.len(), "{method} done");

                Ok(StepOutput::Receipt(receipt))
            }
            StepKind::Const {
                target,
                method,
                args,
                expect,
            } => {
                let call = state.invocation(target, method, args)?;
                let ctx = CallContext::new(state.account.clone());

                let value = self.client.call_const(&ctx, &call).await?;

                info!("{call} = {value}");

                match expect {
                    Some(expected) if *expected != value => Err(StepError::Mismatch {
                        expected: expected.clone(),
                        actual: value,
                    }),
                    _ => Ok(StepOutput::Value(value)),
                }
            }
            StepKind::AdvanceBlocks { blocks } => {
                let block = self.client.advance_blocks(*blocks).await?;

                info!(blocks, block, "advanced");

                Ok(StepOutput::Block(block))
            }
        }
    }
}
