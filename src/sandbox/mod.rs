// SPDX-License-Identifier: Apache-2.0

//! In-process test environment.
//!
//! Contracts are native Rust types registered under a name. The chain is a
//! block counter and a balance ledger; there is no virtual machine.

use crate::{
    account::{AccountId, ContractHandle},
    client::{CallContext, ClientError, ContractClient, Event, Invocation, Receipt},
    value::{deserialize_amount, Args, Value, ValueError},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

mod randao;

pub use randao::{sha_commit, Randao};

/// Reason a native contract rejected a call.
#[derive(Debug, Error)]
pub enum Revert {
    #[error("unknown method")]
    UnknownMethod,
    #[error(transparent)]
    Argument(#[from] ValueError),
    #[error("{0}")]
    Require(String),
}

/// Fail the call with `reason` unless `cond` holds.
pub fn require(cond: bool, reason: impl Into<String>) -> Result<(), Revert> {
    if cond {
        Ok(())
    } else {
        Err(Revert::Require(reason.into()))
    }
}

/// What a native contract sees and may do while handling a call.
pub struct CallEnv<'a> {
    pub sender: &'a AccountId,
    /// Native currency attached to the call, already credited to `balance`.
    pub value: u128,
    pub block: u64,
    pub address: ContractHandle,
    balance: u128,
    ledger: Option<&'a HashMap<AccountId, u128>>,
    transfers: Vec<(AccountId, u128)>,
    events: Vec<Event>,
}

impl<'a> CallEnv<'a> {
    fn new(
        sender: &'a AccountId,
        value: u128,
        block: u64,
        address: ContractHandle,
        balance: u128,
    ) -> Self {
        CallEnv {
            sender,
            value,
            block,
            address,
            balance,
            ledger: None,
            transfers: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Check queued payments against the account balances in `ledger`.
    fn with_ledger(mut self, ledger: &'a HashMap<AccountId, u128>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Balance `to` will hold once the call completes and the payments
    /// queued so far are applied.
    fn pending_balance(&self, to: &AccountId) -> u128 {
        let Some(ledger) = self.ledger else {
            return 0;
        };

        let mut held = ledger.get(to).copied().unwrap_or_default();

        if to == self.sender {
            held = held.saturating_sub(self.value);
        }

        self.transfers
            .iter()
            .filter(|(account, _)| account == to)
            .fold(held, |held, (_, amount)| held.saturating_add(*amount))
    }

    /// Balance of the contract, less transfers queued so far.
    pub fn balance(&self) -> u128 {
        self.balance
    }

    /// Queue a payment from the contract. Payments are applied only if the
    /// call succeeds.
    pub fn transfer(&mut self, to: &AccountId, amount: u128) -> Result<(), Revert> {
        require(amount <= self.balance, "insufficient contract balance")?;
        require(
            self.pending_balance(to).checked_add(amount).is_some(),
            format!("balance of {to} would overflow"),
        )?;

        self.balance -= amount;
        self.transfers.push((to.clone(), amount));

        Ok(())
    }

    pub fn emit(&mut self, name: &str, fields: Vec<(&str, Value)>) {
        self.events.push(Event {
            contract: self.address,
            name: name.to_owned(),
            fields: fields
                .into_iter()
                .map(|(n, v)| (n.to_owned(), v))
                .collect(),
        });
    }
}

/// A contract implemented in Rust.
///
/// Implementations check every precondition before touching their own state,
/// so that a reverted call leaves the contract unchanged.
pub trait NativeContract: Send + Sync {
    /// Handle a state changing call.
    fn action(&mut self, env: &mut CallEnv, method: &str, args: Args) -> Result<Value, Revert>;

    /// Handle a read-only call.
    fn query(&self, env: &CallEnv, method: &str, args: Args) -> Result<Value, Revert>;
}

pub type Factory = fn() -> Box<dyn NativeContract>;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub id: AccountId,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub balance: u128,
}

/// Initial state of a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Genesis {
    /// Block number the chain starts at.
    #[serde(default)]
    pub block: u64,
    /// Mine a block after every successful deploy or action.
    #[serde(default = "default_true")]
    pub auto_mine: bool,
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
}

impl Default for Genesis {
    fn default() -> Self {
        Genesis {
            block: 0,
            auto_mine: true,
            accounts: Vec::new(),
        }
    }
}

struct Instance {
    name: String,
    balance: u128,
    contract: Box<dyn NativeContract>,
}

pub struct Sandbox {
    block: u64,
    auto_mine: bool,
    balances: HashMap<AccountId, u128>,
    nonces: HashMap<AccountId, u64>,
    factories: HashMap<String, Factory>,
    instances: HashMap<ContractHandle, Instance>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Sandbox::new(&Genesis::default())
    }
}

impl Sandbox {
    /// Create a sandbox with the built-in contracts registered.
    pub fn new(genesis: &Genesis) -> Self {
        let mut sandbox = Sandbox {
            block: genesis.block,
            auto_mine: genesis.auto_mine,
            balances: HashMap::new(),
            nonces: HashMap::new(),
            factories: HashMap::new(),
            instances: HashMap::new(),
        };

        for account in &genesis.accounts {
            sandbox.balances.insert(account.id.clone(), account.balance);
        }

        sandbox.register("randao", Randao::boxed);

        sandbox
    }

    /// Make `factory` deployable under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, factory: Factory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn block_number(&self) -> u64 {
        self.block
    }

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Credit `amount` to `account`. Fails without crediting anything if the
    /// balance would exceed `u128::MAX`.
    pub fn mint(&mut self, account: &AccountId, amount: u128) -> Result<(), ClientError> {
        let balance = self.balances.entry(account.clone()).or_default();

        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| ClientError::BalanceOverflow(account.to_string()))?;

        Ok(())
    }

    pub fn contract_balance(&self, handle: &ContractHandle) -> Option<u128> {
        self.instances.get(handle).map(|i| i.balance)
    }

    pub fn contract_name(&self, handle: &ContractHandle) -> Option<&str> {
        self.instances.get(handle).map(|i| i.name.as_str())
    }

    fn instance(&self, call: &Invocation) -> Result<&Instance, ClientError> {
        let instance = self
            .instances
            .get(&call.handle)
            .ok_or(ClientError::UnknownHandle(call.handle))?;

        if instance.name != call.contract {
            return Err(ClientError::WrongContract {
                handle: call.handle,
                expected: call.contract.clone(),
                actual: instance.name.clone(),
            });
        }

        Ok(instance)
    }

    fn check_funds(&self, ctx: &CallContext) -> Result<(), ClientError> {
        let balance = self.balance_of(&ctx.sender);

        if balance < ctx.value {
            return Err(ClientError::InsufficientBalance {
                account: ctx.sender.clone(),
                balance,
                value: ctx.value,
            });
        }

        Ok(())
    }

    fn debit(&mut self, account: &AccountId, amount: u128) {
        if let Some(balance) = self.balances.get_mut(account) {
            *balance -= amount;
        }
    }

    fn mine(&mut self) {
        if self.auto_mine {
            self.block += 1;
        }
    }
}

fn reverted(call: &Invocation, kind: &'static str, revert: Revert) -> ClientError {
    match revert {
        Revert::UnknownMethod => ClientError::UnknownMethod {
            contract: call.contract.clone(),
            method: call.method.clone(),
            kind,
        },
        Revert::Argument(source) => ClientError::BadArgument {
            method: call.method.clone(),
            source,
        },
        Revert::Require(reason) => ClientError::Reverted {
            method: call.method.clone(),
            reason,
        },
    }
}

#[async_trait::async_trait]
impl ContractClient for Sandbox {
    async fn deploy(
        &mut self,
        ctx: &CallContext,
        contract: &str,
    ) -> Result<ContractHandle, ClientError> {
        let factory = *self
            .factories
            .get(contract)
            .ok_or_else(|| ClientError::UnknownContract(contract.to_owned()))?;

        self.check_funds(ctx)?;

        let nonce = self.nonces.entry(ctx.sender.clone()).or_default();
        let handle = ContractHandle::derive(&ctx.sender, *nonce);
        *nonce += 1;

        self.debit(&ctx.sender, ctx.value);
        self.instances.insert(
            handle,
            Instance {
                name: contract.to_owned(),
                balance: ctx.value,
                contract: factory(),
            },
        );

        debug!(contract, %handle, block = self.block, "deployed");

        self.mine();

        Ok(handle)
    }

    async fn send_action(
        &mut self,
        ctx: &CallContext,
        call: &Invocation,
    ) -> Result<Receipt, ClientError> {
        self.instance(call)?;
        self.check_funds(ctx)?;

        let block = self.block;
        let instance = self
            .instances
            .get_mut(&call.handle)
            .ok_or(ClientError::UnknownHandle(call.handle))?;

        let balance = instance
            .balance
            .checked_add(ctx.value)
            .ok_or_else(|| ClientError::BalanceOverflow(call.handle.to_string()))?;

        let mut env = CallEnv::new(&ctx.sender, ctx.value, block, call.handle, balance)
            .with_ledger(&self.balances);

        let output = instance
            .contract
            .action(&mut env, &call.method, Args::new(&call.args))
            .map_err(|e| reverted(call, "action", e))?;

        let CallEnv {
            balance,
            transfers,
            events,
            ..
        } = env;

        instance.balance = balance;
        self.debit(&ctx.sender, ctx.value);

        for (to, amount) in transfers {
            self.mint(&to, amount)?;
        }

        debug!(%call, block, events = events.len(), "action executed");

        self.mine();

        Ok(Receipt {
            block,
            output,
            events,
        })
    }

    async fn call_const(
        &self,
        ctx: &CallContext,
        call: &Invocation,
    ) -> Result<Value, ClientError> {
        let instance = self.instance(call)?;

        let env = CallEnv::new(&ctx.sender, 0, self.block, call.handle, instance.balance);

        instance
            .contract
            .query(&env, &call.method, Args::new(&call.args))
            .map_err(|e| reverted(call, "const", e))
    }

    async fn advance_blocks(&mut self, blocks: u64) -> Result<u64, ClientError> {
        self.block = self.block.saturating_add(blocks);

        debug!(block = self.block, "advanced");

        Ok(self.block)
    }
}
