// SPDX-License-Identifier: Apache-2.0

//! `harness.toml`: which environment to run in and which scenario to run.
//!
//! ```toml
//! [environment]
//! default_account = "deployer"
//! block = 0
//! auto_mine = true
//!
//! [[environment.accounts]]
//! id = "deployer"
//! balance = "1000000000000000000000000"
//!
//! [driver]
//! step_timeout_ms = 30000
//!
//! [scenario]
//! name = "randao"
//!
//! [[scenario.step]]
//! name = "deploy"
//! kind = "deploy"
//! contract = "randao"
//! ```
//!
//! Every table is optional. A missing `[scenario]` means the built-in randao
//! scenario.

use crate::{
    account::AccountId,
    sandbox::{Genesis, GenesisAccount},
    scenario::{self, Scenario, ScenarioError},
};
use itertools::Itertools;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Name of the configuration file looked for in the current directory.
pub const CONFIG_FILE: &str = "harness.toml";

/// Balance given to the default accounts: one million tokens of 18 decimals.
pub const DEFAULT_BALANCE: u128 = 1_000_000 * 10u128.pow(18);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("account '{0}' is listed more than once")]
    DuplicateAccount(AccountId),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

fn default_account() -> AccountId {
    AccountId::from_static("deployer")
}

fn default_true() -> bool {
    true
}

fn default_accounts() -> Vec<GenesisAccount> {
    [default_account(), AccountId::from_static(scenario::RANDAO_FOLLOWER)]
        .into_iter()
        .map(|id| GenesisAccount {
            id,
            balance: DEFAULT_BALANCE,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Sender of calls until the scenario switches account.
    #[serde(default = "default_account")]
    pub default_account: AccountId,
    #[serde(default)]
    pub block: u64,
    #[serde(default = "default_true")]
    pub auto_mine: bool,
    #[serde(default = "default_accounts")]
    pub accounts: Vec<GenesisAccount>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            default_account: default_account(),
            block: 0,
            auto_mine: true,
            accounts: default_accounts(),
        }
    }
}

impl EnvironmentConfig {
    pub fn genesis(&self) -> Genesis {
        Genesis {
            block: self.block,
            auto_mine: self.auto_mine,
            accounts: self.accounts.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    pub step_timeout_ms: Option<u64>,
}

impl DriverConfig {
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default = "scenario::randao")]
    pub scenario: Scenario,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            environment: EnvironmentConfig::default(),
            driver: DriverConfig::default(),
            scenario: scenario::randao(),
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: HarnessConfig = toml::from_str(text)?;

        config.validate()?;

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(account) = self
            .environment
            .accounts
            .iter()
            .map(|a| &a.id)
            .duplicates()
            .next()
        {
            return Err(ConfigError::DuplicateAccount(account.clone()));
        }

        self.scenario.validate()?;

        Ok(())
    }
}
