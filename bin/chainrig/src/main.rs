//! chainrig is a CLI tool that deploys a suite of dependent smart contracts
//! in dependency order and wires them together afterwards.

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;

use chainrig_deploy::{
    ChainrigConfig, DeploymentExecutor, DeploymentJournal, DeploymentPlan, ErrorClass, HttpChain,
    JOURNAL_FILENAME, RunOutcome, suite_hash,
};
use cli::{Cli, Command, OutputFormat};

/// Exit code for configuration and graph errors, which abort before any
/// network traffic.
const EXIT_CONFIG: u8 = 2;
/// Exit code for a run cancelled at a between-units checkpoint.
const EXIT_ABORTED: u8 = 130;

fn exit_code_for(class: ErrorClass) -> u8 {
    match class {
        ErrorClass::Deploy => 3,
        ErrorClass::Call => 4,
        ErrorClass::Timeout => 5,
        ErrorClass::Wiring => 6,
        ErrorClass::Internal => 70,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = ChainrigConfig::load_from_file(&cli.config)?;
    let plan = config
        .suite()
        .to_plan()
        .context("Invalid contract suite")?;

    match cli.command {
        Command::Plan { format } => {
            print_plan(&plan, format)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Deploy {
            network,
            resume,
            artifacts,
        } => deploy(&cli.config, &config, &plan, &network, resume, artifacts).await,
    }
}

async fn deploy(
    config_path: &Path,
    config: &ChainrigConfig,
    plan: &DeploymentPlan,
    network: &str,
    resume: bool,
    artifacts: PathBuf,
) -> Result<ExitCode> {
    let mut ctx = config.network(network)?.clone();
    ctx.validate()?;

    let hash = suite_hash(&config.suite());
    let journal_file = journal_path(config_path);

    if resume {
        let journal = DeploymentJournal::load_from_file(&journal_file)
            .context("--resume needs an existing deployments journal")?;
        journal.check_matches(network, &hash)?;
        tracing::info!(
            entries = journal.addresses.len(),
            "Resuming from deployments journal"
        );
        // Explicit config overrides win over journal entries.
        for (unit, address) in journal.addresses {
            ctx.pre_existing.entry(unit).or_insert(address);
        }
    }

    tracing::info!(
        network = %network,
        endpoint = %ctx.endpoint_url,
        units = plan.units().len(),
        "Starting deployment run..."
    );

    let chain = HttpChain::new(artifacts)?;
    chain
        .check_network(&ctx)
        .await
        .context("Network preflight check failed")?;

    let executor = DeploymentExecutor::new();

    // Ctrl+C requests a stop at the next between-units checkpoint; an
    // in-flight transaction is left to resolve on the network.
    let abort = executor.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl+C received, stopping after the current unit...");
            abort.abort();
        }
    });

    let report = executor.run(plan, &ctx, &chain).await;

    println!("{}", report.to_table());
    match report.outcome() {
        RunOutcome::Completed => {
            tracing::info!(
                deployed = report.deployed().count(),
                wired = report.wired().len(),
                "Deployment complete"
            );
        }
        RunOutcome::Halted { unit, error } => {
            tracing::error!(
                unit = %unit,
                class = %error.class(),
                "Deployment halted: {error}"
            );
        }
        RunOutcome::Aborted { remaining } => {
            tracing::warn!(skipped = remaining.len(), "Deployment aborted");
        }
    }

    // Persist the ledger so a later --resume can continue from here.
    let journal = DeploymentJournal::from_report(network, hash, &report);
    if let Err(err) = journal.save_to_file(&journal_file) {
        tracing::warn!("Failed to save deployments journal: {err:#}");
    }

    Ok(match report.outcome() {
        RunOutcome::Completed => ExitCode::SUCCESS,
        RunOutcome::Halted { error, .. } => ExitCode::from(exit_code_for(error.class())),
        RunOutcome::Aborted { .. } => ExitCode::from(EXIT_ABORTED),
    })
}

/// The journal lives next to the configuration file.
fn journal_path(config_path: &Path) -> PathBuf {
    if config_path.is_dir() {
        config_path.join(JOURNAL_FILENAME)
    } else {
        config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .join(JOURNAL_FILENAME)
    }
}

fn print_plan(plan: &DeploymentPlan, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(plan).context("Failed to serialize plan")?;
            println!("{json}");
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["#", "Unit", "Artifact", "Depends on"]);
            for (i, unit) in plan.units().iter().enumerate() {
                table.add_row(vec![
                    (i + 1).to_string(),
                    unit.name.clone(),
                    unit.artifact.clone(),
                    unit.depends_on
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                ]);
            }
            println!("{table}");

            for action in plan.wiring() {
                println!(
                    "wire: {}.{}(@{})",
                    action.target, action.method, action.subject
                );
            }
        }
    }
    Ok(())
}
