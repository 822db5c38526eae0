mod backend;
mod cluster;
mod commands;
mod console;
mod error;
mod net;
mod steps;
#[cfg(test)]
mod testing;

use backend::LiveBackend;
use clap::{Args, Parser, Subcommand};
use cluster::{MAX_AGENTS, Scope};
use colored::Colorize;
use commands::{Action, DeployRequest, Session};
use console::StdinPrompt;
use error::WorkflowError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status after Ctrl-C
const INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "htpfleet")]
#[command(about = "Deploy a Hashtopolis cracking cluster on Linode", long_about = None)]
struct Cli {
    /// Settings file (default: ./htpfleet.yaml, then ~/.config/htpfleet/config.yaml)
    #[arg(short, long, global = true, env = "HTPFLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Without a command the interactive menu opens
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone, Default)]
struct PlanArgs {
    /// Region id or label (e.g. eu-central)
    #[arg(short, long)]
    region: Option<String>,

    /// Agent instance type id or label (e.g. g1-gpu-rtx6000-1)
    #[arg(short = 't', long = "type")]
    agent_type: Option<String>,

    /// Number of agents
    #[arg(short = 'n', long, value_parser = parse_amount)]
    amount: Option<usize>,

    /// Deploy without confirmation
    #[arg(short, long)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the server and the agents
    Deploy(PlanArgs),
    /// Deploy only the Hashtopolis server
    #[command(name = "deploy-server")]
    DeployServer {
        /// Region id or label
        #[arg(short, long)]
        region: Option<String>,
        /// Deploy without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Deploy agents against a running server
    #[command(name = "deploy-agents")]
    DeployAgents(PlanArgs),
    /// Remove every cluster resource
    Remove {
        /// Remove without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Remove agent instances only
    #[command(name = "remove-agents")]
    RemoveAgents {
        /// Remove without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Create or overwrite the settings file
    Configure,
    /// Show version information
    Version,
}

impl Commands {
    /// Workflow to run and whether confirmations are skipped
    fn action(&self) -> Option<(Action, bool)> {
        let plan = |request: DeployRequest, args: &PlanArgs| DeployRequest {
            region: args.region.clone(),
            agent_type: args.agent_type.clone(),
            amount: args.amount,
            ..request
        };

        let action = match self {
            Commands::Deploy(args) => (Action::Deploy(plan(DeployRequest::full(), args)), args.yes),
            Commands::DeployAgents(args) => (
                Action::Deploy(plan(DeployRequest::agents_only(), args)),
                args.yes,
            ),
            Commands::DeployServer { region, yes } => (
                Action::Deploy(DeployRequest {
                    region: region.clone(),
                    ..DeployRequest::server_only()
                }),
                *yes,
            ),
            Commands::Remove { yes } => (
                Action::Remove {
                    scope: Scope::Cluster,
                    force: *yes,
                },
                *yes,
            ),
            Commands::RemoveAgents { yes } => (
                Action::Remove {
                    scope: Scope::AgentsOnly,
                    force: *yes,
                },
                *yes,
            ),
            Commands::Configure => (Action::Configure, false),
            Commands::Version => return None,
        };
        Some(action)
    }
}

fn parse_amount(value: &str) -> Result<usize, String> {
    let amount: usize = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if (1..=MAX_AGENTS).contains(&amount) {
        Ok(amount)
    } else {
        Err(format!("choose a REASONABLE amount (1-{})", MAX_AGENTS))
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print a workflow error and map it to an exit status
fn report(err: &WorkflowError) -> u8 {
    match err {
        WorkflowError::Declined => println!("# Exiting"),
        _ => eprintln!("{} {}", "Error:".red().bold(), err),
    }
    err.exit_code()
}

enum Outcome {
    Finished(error::Result<()>),
    Interrupted,
}

/// Forced teardown of everything the cluster owns
async fn autoclean(session: &mut Session<'_>) {
    println!("{}", "# Cleaning up".yellow());
    if let Err(e) = commands::remove::remove(session, Scope::Cluster, true).await {
        eprintln!("{} cleanup failed: {}", "Error:".red().bold(), e);
    }
}

/// Exit status for a workflow outcome
///
/// Only an interrupt runs the forced teardown. A workflow that fails on its
/// own leaves the cloud as it is.
async fn settle(
    session: &mut Session<'_>,
    outcome: Outcome,
    action: &Action,
    autoclean_enabled: bool,
) -> u8 {
    match outcome {
        Outcome::Finished(Ok(())) => 0,
        Outcome::Finished(Err(e)) => report(&e),
        Outcome::Interrupted => {
            println!();
            println!("{}", "# Interrupted".yellow());
            if autoclean_enabled && action.touches_cloud() {
                autoclean(session).await;
            }
            println!("# Exiting");
            INTERRUPTED
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if matches!(cli.command, Some(Commands::Version)) {
        println!("htpfleet {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let cwd = std::env::current_dir()?;
    let config_path = htpfleet_config::resolve_config_path(cli.config.as_deref(), &cwd)?;
    tracing::debug!("Using settings file {}", config_path.display());
    let mut prompt = StdinPrompt::new();

    // configure must work even when the current file is broken
    if matches!(cli.command, Some(Commands::Configure)) {
        return Ok(
            match commands::configure::reconfigure(&config_path, &mut prompt).await {
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => ExitCode::from(report(&e)),
            },
        );
    }

    let config = match commands::configure::load_or_create(&config_path, &mut prompt).await {
        Ok(config) => config,
        Err(e) => return Ok(ExitCode::from(report(&e))),
    };
    let backend = LiveBackend::from_config(&config)?;

    let (action, assume_yes) = match cli.command.as_ref().and_then(Commands::action) {
        Some(selected) => selected,
        None => match commands::pick_action(&mut prompt).await {
            Ok(action) => (action, false),
            Err(e) => return Ok(ExitCode::from(report(&WorkflowError::from(e)))),
        },
    };
    if action == Action::Exit {
        return Ok(ExitCode::SUCCESS);
    }

    let autoclean_enabled = config.settings.autoclean_when_failed;
    let mut session = Session {
        config,
        config_path,
        backend: &backend,
        prompt: &mut prompt,
        assume_yes,
    };

    let outcome = tokio::select! {
        result = commands::run(&mut session, &action) => Outcome::Finished(result),
        Ok(()) = tokio::signal::ctrl_c() => Outcome::Interrupted,
    };

    let code = settle(&mut session, outcome, &action, autoclean_enabled).await;
    if code == INTERRUPTED {
        // a pending stdin read would keep the runtime from shutting down
        std::process::exit(i32::from(code));
    }
    Ok(ExitCode::from(code))
}
