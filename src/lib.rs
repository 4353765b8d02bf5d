// SPDX-License-Identifier: Apache-2.0

//! Scripted contract tests.
//!
//! A [`Scenario`] is an ordered list of named steps: deploy a contract,
//! switch the sending account, call actions and const methods, move the chain
//! forward. A [`Driver`] runs those steps one after another against any
//! [`ContractClient`] and stops at the first failure, producing a [`Report`].
//!
//! The crate ships an in-process [`Sandbox`] client with a native RANDAO
//! contract, so scenarios can run without a node:
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! use randao_harness::{scenario, Driver, DriverOptions, HarnessConfig, Sandbox};
//!
//! let config = HarnessConfig::default();
//! let sandbox = Sandbox::new(&config.environment.genesis());
//! let options = DriverOptions::new(config.environment.default_account.clone());
//!
//! let report = Driver::new(sandbox, options).run(&scenario::randao()).await;
//! assert!(report.success());
//! # });
//! ```

pub mod account;
pub mod client;
pub mod config;
pub mod driver;
pub mod report;
pub mod sandbox;
pub mod scenario;
pub mod template;
pub mod value;

pub use account::{AccountId, ContractHandle};
pub use client::{CallContext, ClientError, ContractClient, Event, Invocation, Receipt};
pub use config::HarnessConfig;
pub use driver::{Driver, DriverOptions};
pub use report::{Outcome, Report};
pub use sandbox::Sandbox;
pub use scenario::{Scenario, Step, StepKind};
pub use value::Value;
