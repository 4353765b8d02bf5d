// SPDX-License-Identifier: Apache-2.0

use clap::{builder::ValueParser, value_parser, ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;
use randao_harness::{
    config::{ConfigError, CONFIG_FILE},
    scenario::ScenarioError,
    AccountId, HarnessConfig,
};
use std::path::{Path, PathBuf};


#[derive(Parser)]
#[command(author = env!("CARGO_PKG_AUTHORS"), version, about = env!("CARGO_PKG_DESCRIPTION"), subcommand_required = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the configured scenario against the sandbox")]
    Run(Run),

    #[command(about = "List the steps of the configured scenario")]
    List(List),

    #[command(about = "Write a harness.toml containing the randao scenario")]
    New(New),

    #[command(about = "Print shell completion for various shells to STDOUT")]
    ShellComplete(ShellComplete),
}

#[derive(Args)]
pub struct ConfigArg {
    #[arg(name = "CONFFILE", help = "Take the scenario and environment from this file [default: harness.toml when present]", long = "config-file", value_parser = ValueParser::path_buf(), num_args = 1)]
    pub config_file: Option<PathBuf>,
}

impl ConfigArg {
    /// Load the named file, else `harness.toml` in the current directory,
    /// else the built-in configuration.
    pub fn load(&self) -> Result<HarnessConfig, ConfigError> {
        match &self.config_file {
            Some(path) => HarnessConfig::load(path),
            None if Path::new(CONFIG_FILE).exists() => HarnessConfig::load(Path::new(CONFIG_FILE)),
            None => Ok(HarnessConfig::default()),
        }
    }
}

#[derive(Args)]
pub struct Run {
    #[clap(flatten)]
    pub config: ConfigArg,

    #[arg(name = "ENABLE", help = "Enable the named step", long = "enable", action = ArgAction::Append, num_args = 1)]
    pub enable: Vec<String>,

    #[arg(name = "DISABLE", help = "Disable the named step", long = "disable", action = ArgAction::Append, num_args = 1)]
    pub disable: Vec<String>,

    #[arg(name = "ACCOUNT", help = "Account to send from until a step switches it", long = "account", value_parser = value_parser!(AccountId), num_args = 1)]
    pub account: Option<AccountId>,

    #[arg(name = "STEPTIMEOUT", help = "Fail any step taking longer than this many milliseconds", long = "step-timeout", value_parser = value_parser!(u64), num_args = 1)]
    pub step_timeout: Option<u64>,

    #[arg(name = "JSON", help = "Print the report as JSON", long = "json", action = ArgAction::SetTrue)]
    pub json: bool,

    #[arg(name = "VERBOSE", help = "show debug messages", short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Run {
    /// Apply the flags given on the command line on top of `config`.
    pub fn apply(&self, config: &mut HarnessConfig) -> Result<(), ScenarioError> {
        for name in &self.enable {
            config.scenario.set_enabled(name, true)?;
        }

        for name in &self.disable {
            config.scenario.set_enabled(name, false)?;
        }

        if let Some(account) = &self.account {
            config.environment.default_account = account.clone();
        }

        if let Some(ms) = self.step_timeout {
            config.driver.step_timeout_ms = Some(ms);
        }

        Ok(())
    }
}

#[derive(Args)]
pub struct List {
    #[clap(flatten)]
    pub config: ConfigArg,
}

#[derive(Args)]
pub struct New {
    #[arg(name = "DIR", help = "Directory to write harness.toml to [default: current directory]", value_parser = ValueParser::path_buf(), num_args = 1)]
    pub dir: Option<PathBuf>,

    #[arg(name = "FORCE", help = "Overwrite an existing harness.toml", long = "force", action = ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Args)]
pub struct ShellComplete {
    #[arg(required = true, value_parser = value_parser!(Shell), help = "Name of a supported shell")]
    pub shell_complete: Shell,
}
