// SPDX-License-Identifier: Apache-2.0

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use randao_harness::{
    config::CONFIG_FILE, template, Driver, DriverOptions, HarnessConfig, Sandbox,
};
use std::{fs, path::PathBuf, process::exit};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

use cli::{Cli, Commands, List, New, Run};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Commands::Run(run) if run.verbose);
    init_tracing(verbose);

    match cli.command {
        Commands::Run(run) => {
            if !run_scenario(run).await? {
                exit(1);
            }
        }
        Commands::List(list) => list_steps(list)?,
        Commands::New(new) => new_config(new)?,
        Commands::ShellComplete(shell) => {
            let mut app = Cli::command();
            let name = app.get_name().to_string();
            generate(shell.shell_complete, &mut app, name, &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Log to stderr so that stdout only carries the report.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

async fn run_scenario(run: Run) -> anyhow::Result<bool> {
    let mut config = run
        .config
        .load()
        .context("cannot load configuration")?;

    run.apply(&mut config)?;

    let mut options = DriverOptions::new(config.environment.default_account.clone());
    options.step_timeout = config.driver.step_timeout();

    let sandbox = Sandbox::new(&config.environment.genesis());
    let report = Driver::new(sandbox, options).run(&config.scenario).await;

    if run.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    Ok(report.success())
}

fn list_steps(list: List) -> anyhow::Result<()> {
    let config: HarnessConfig = list
        .config
        .load()
        .context("cannot load configuration")?;

    println!("scenario {}", config.scenario.name);

    for step in &config.scenario.steps {
        println!(
            "  [{}] {} ({})",
            if step.enabled { "x" } else { " " },
            step.name,
            step.kind.name()
        );
    }

    Ok(())
}

fn new_config(new: New) -> anyhow::Result<()> {
    let dir = new.dir.unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create directory '{}'", dir.display()))?;

    let path = dir.join(CONFIG_FILE);

    if path.exists() && !new.force {
        bail!("'{}' already exists", path.display());
    }

    let text = template::render(&HarnessConfig::default())?;

    fs::write(&path, text).with_context(|| format!("cannot write '{}'", path.display()))?;

    println!("created {}", path.display());

    Ok(())
}
