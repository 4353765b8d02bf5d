// SPDX-License-Identifier: Apache-2.0

//! The seam between the driver and whatever deploys and executes contracts.

use crate::{
    account::{AccountId, ContractHandle},
    value::{Value, ValueError},
};
use itertools::Itertools;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The sender of a call and the native currency attached to it.
///
/// Every collaborator call receives one explicitly; there is no ambient
/// "current account".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub sender: AccountId,
    pub value: u128,
}

impl CallContext {
    pub fn new(sender: AccountId) -> Self {
        CallContext { sender, value: 0 }
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }
}

/// A method call on a deployed contract instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub contract: String,
    pub handle: ContractHandle,
    pub method: String,
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn new(
        contract: impl Into<String>,
        handle: ContractHandle,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Invocation {
            contract: contract.into(),
            handle,
            method: method.into(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}@{}.{}({})",
            self.contract,
            self.handle,
            self.method,
            self.args.iter().join(", ")
        )
    }
}

/// Something a contract logged while handling an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub contract: ContractHandle,
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

impl Event {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find_map(|(n, v)| if n == name { Some(v) } else { None })
    }
}

/// Outcome of a successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    /// Block the action was executed in.
    pub block: u64,
    pub output: Value,
    pub events: Vec<Event>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no contract named '{0}' is available for deployment")]
    UnknownContract(String),
    #[error("no contract deployed at {0}")]
    UnknownHandle(ContractHandle),
    #[error("contract at {handle} is '{actual}', not '{expected}'")]
    WrongContract {
        handle: ContractHandle,
        expected: String,
        actual: String,
    },
    #[error("contract '{contract}' has no {kind} method '{method}'")]
    UnknownMethod {
        contract: String,
        method: String,
        kind: &'static str,
    },
    #[error("invalid arguments for '{method}': {source}")]
    BadArgument {
        method: String,
        #[source]
        source: ValueError,
    },
    #[error("{account} has balance {balance}, cannot attach {value}")]
    InsufficientBalance {
        account: AccountId,
        balance: u128,
        value: u128,
    },
    #[error("balance of {0} would overflow")]
    BalanceOverflow(String),
    #[error("'{method}' reverted: {reason}")]
    Reverted { method: String, reason: String },
    #[error("{0} is not supported by this environment")]
    Unsupported(&'static str),
}

/// Deploys contracts and executes their methods on behalf of the driver.
///
/// Implementations are free to talk to a node, a simulator, or run contracts
/// in process. Calls are issued one at a time; each future is awaited to
/// completion before the next call starts.
#[async_trait::async_trait]
pub trait ContractClient: Send + Sync {
    /// Deploy the contract known as `contract` and return its handle.
    async fn deploy(
        &mut self,
        ctx: &CallContext,
        contract: &str,
    ) -> Result<ContractHandle, ClientError>;

    /// Execute a state changing method.
    async fn send_action(
        &mut self,
        ctx: &CallContext,
        call: &Invocation,
    ) -> Result<Receipt, ClientError>;

    /// Evaluate a read-only method against the current state.
    async fn call_const(&self, ctx: &CallContext, call: &Invocation)
        -> Result<Value, ClientError>;

    /// Move the chain forward by `blocks`, returning the new block number.
    async fn advance_blocks(&mut self, blocks: u64) -> Result<u64, ClientError> {
        let _ = blocks;
        Err(ClientError::Unsupported("advancing blocks"))
    }
}
