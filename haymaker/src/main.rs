//! Haymaker - Entry Point
//!
//! Command line front end for workload lifecycle management.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use futures::StreamExt;
use serde_json::{Map, Value};
use tracing::{debug, error};

use haymaker::driver::{self, CleanupOutcome, ListFilter, DEFAULT_LIST_LIMIT};
use haymaker::errors::HaymakerError;
use haymaker::filesys::file::File;
use haymaker::logs::{init_logging, LogLevel, LogOptions};
use haymaker::storage::layout::StorageLayout;
use haymaker::storage::settings::Settings;
use haymaker::utils::version_info;
use haymaker::workloads::{
    DeploymentConfig, DeploymentLocator, DeploymentState, DeploymentStatus, FilePlatform,
    Platform, WorkloadRegistry,
};

const DEFAULT_LOG_LINES: usize = 100;

const USAGE: &str = "\
Usage: haymaker <command> [args] [--key=value ...]

Commands:
  workloads                         List registered workloads
  install <path-or-repo-url>        Install a workload package
  deploy <workload> [--config=FILE] [--duration-hours=N]
  status <deployment-id> [--json]
  list [--workload=NAME] [--status=STATUS] [--limit=N]
  logs <deployment-id> [--follow] [--lines=N]
  stop <deployment-id> --yes
  start <deployment-id>
  cleanup <deployment-id> [--dry-run] --yes
  version";

/// Parsed command line: positional words and `--key=value` flags
struct CliArgs {
    words: Vec<String>,
    flags: HashMap<String, String>,
}

impl CliArgs {
    fn parse(args: impl Iterator<Item = String>) -> Self {
        let mut words = Vec::new();
        let mut flags = HashMap::new();
        for arg in args {
            if let Some(flag) = arg.strip_prefix("--") {
                match flag.split_once('=') {
                    Some((key, value)) => flags.insert(key.to_string(), value.to_string()),
                    None => flags.insert(flag.to_string(), "true".to_string()),
                };
            } else {
                words.push(arg);
            }
        }
        Self { words, flags }
    }

    fn command(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }

    fn positional(&self, index: usize, what: &str) -> Result<&str, HaymakerError> {
        self.words
            .get(index + 1)
            .map(String::as_str)
            .ok_or_else(|| HaymakerError::ValidationError(format!("missing {}", what)))
    }

    fn flag(&self, key: &str) -> bool {
        self.flags
            .get(key)
            .map(|v| v != "false")
            .unwrap_or(false)
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.flags.get(key).map(String::as_str)
    }

    fn number(&self, key: &str, default: usize) -> Result<usize, HaymakerError> {
        match self.value(key) {
            Some(raw) => raw.parse().map_err(|_| {
                HaymakerError::ValidationError(format!("--{} expects a number, got {:?}", key, raw))
            }),
            None => Ok(default),
        }
    }
}

/// Everything a command needs
struct Runtime {
    registry: WorkloadRegistry,
    locator: DeploymentLocator,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse(env::args().skip(1));

    let Some(command) = cli.command() else {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    };

    if command == "version" || cli.flag("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("{}", e),
        }
        return ExitCode::SUCCESS;
    }

    if command == "help" || cli.flag("help") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    // Settings and logging
    let layout = StorageLayout::from_env();
    let settings = match Settings::load(&layout).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let log_level = match cli.value("log-level").map(str::parse::<LogLevel>) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
        None => settings.log_level,
    };
    let log_options = LogOptions {
        log_level,
        json_format: settings.json_logs,
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let runtime = match build_runtime(&layout, &settings).await {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to set up haymaker: {}", e);
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    match dispatch(command, &cli, &runtime).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("Command {} failed: {:?}", command, e);
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn build_runtime(
    layout: &StorageLayout,
    settings: &Settings,
) -> Result<Runtime, HaymakerError> {
    layout.setup().await?;
    let platform: Arc<dyn Platform> =
        Arc::new(FilePlatform::open(settings.state_dir(layout)).await?);
    Ok(Runtime {
        registry: WorkloadRegistry::from_settings(layout, settings, Some(platform)),
        locator: DeploymentLocator::new(),
    })
}

async fn dispatch(command: &str, cli: &CliArgs, rt: &Runtime) -> Result<(), HaymakerError> {
    match command {
        "workloads" => {
            let names = rt.registry.list().await;
            if names.is_empty() {
                println!("No workloads installed");
            }
            for name in names {
                println!("{}", name);
            }
        }
        "install" => {
            let source = cli.positional(0, "package path or repository url")?;
            let name = driver::install(&rt.registry, source).await?;
            println!("{} {}", "Installed".green(), name.bold());
        }
        "deploy" => {
            let workload = cli.positional(0, "workload name")?;
            let config = deploy_config(workload, cli).await?;
            let id = driver::deploy(&rt.registry, &config).await?;
            println!("{} {}", "Deployed".green(), id.bold());
        }
        "status" => {
            let id = cli.positional(0, "deployment id")?;
            let state = driver::status(&rt.registry, &rt.locator, id).await?;
            if cli.flag("json") {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_state(&state);
            }
        }
        "list" => {
            let filter = ListFilter {
                workload: cli.value("workload").map(str::to_string),
                status: cli.value("status").map(str::parse).transpose()?,
                limit: cli.number("limit", DEFAULT_LIST_LIMIT)?,
            };
            let states = driver::list(&rt.registry, &filter).await?;
            if states.is_empty() {
                println!("No deployments");
            }
            for state in &states {
                println!(
                    "{:<28} {:<28} {:<12} {}",
                    state.deployment_id,
                    state.workload_name,
                    colored_status(state.status),
                    state.phase
                );
            }
        }
        "logs" => {
            let id = cli.positional(0, "deployment id")?;
            let lines = cli.number("lines", DEFAULT_LOG_LINES)?;
            let mut stream =
                driver::logs(&rt.registry, &rt.locator, id, cli.flag("follow"), lines).await?;
            while let Some(line) = stream.next().await {
                println!("{}", line);
            }
        }
        "stop" => {
            let id = cli.positional(0, "deployment id")?;
            require_confirmation(cli, "stop", id)?;
            if driver::stop(&rt.registry, &rt.locator, id).await? {
                println!("{} {}", "Stopped".yellow(), id);
            } else {
                println!("{} was not stopped", id);
            }
        }
        "start" => {
            let id = cli.positional(0, "deployment id")?;
            if driver::start(&rt.registry, &rt.locator, id).await? {
                println!("{} {}", "Running".green(), id);
            } else {
                println!("{} was not started", id);
            }
        }
        "cleanup" => {
            let id = cli.positional(0, "deployment id")?;
            let dry_run = cli.flag("dry-run");
            if !dry_run {
                require_confirmation(cli, "clean up", id)?;
            }
            match driver::cleanup(&rt.registry, &rt.locator, id, dry_run).await? {
                CleanupOutcome::DryRun(state) => {
                    println!("{}", "Dry run, nothing deleted".yellow());
                    print_state(&state);
                }
                CleanupOutcome::Done(report) => {
                    println!(
                        "{} {}: {} deleted, {} failed ({:.1}s)",
                        "Cleaned up".green(),
                        report.deployment_id,
                        report.resources_deleted,
                        report.resources_failed,
                        report.duration_seconds
                    );
                    for error in &report.errors {
                        println!("  {} {}", "!".red(), error);
                    }
                }
            }
        }
        other => {
            return Err(HaymakerError::ValidationError(format!(
                "unknown command {:?}\n\n{}",
                other, USAGE
            )));
        }
    }
    Ok(())
}

/// Destructive commands need an explicit `--yes`
fn require_confirmation(cli: &CliArgs, action: &str, id: &str) -> Result<(), HaymakerError> {
    if cli.flag("yes") {
        return Ok(());
    }
    Err(HaymakerError::ValidationError(format!(
        "refusing to {} {} without --yes",
        action, id
    )))
}

async fn deploy_config(workload: &str, cli: &CliArgs) -> Result<DeploymentConfig, HaymakerError> {
    let mut config = DeploymentConfig::new(workload);
    if let Some(path) = cli.value("config") {
        let file = File::new(path);
        let workload_config: Map<String, Value> =
            if path.ends_with(".yaml") || path.ends_with(".yml") {
                file.read_yaml().await?
            } else {
                file.read_json().await?
            };
        config.workload_config = workload_config;
    }
    if let Some(hours) = cli.value("duration-hours") {
        let hours = hours.parse().map_err(|_| {
            HaymakerError::ValidationError(format!("invalid --duration-hours {:?}", hours))
        })?;
        config.duration_hours = Some(hours);
    }
    Ok(config)
}

fn colored_status(status: DeploymentStatus) -> colored::ColoredString {
    let text = status.as_str();
    match status {
        DeploymentStatus::Running => text.green(),
        DeploymentStatus::Completed => text.blue(),
        DeploymentStatus::Failed => text.red(),
        DeploymentStatus::Stopped => text.yellow(),
        _ => text.normal(),
    }
}

fn print_state(state: &DeploymentState) {
    println!("{}  {}", "Deployment:".bold(), state.deployment_id);
    println!("{}    {}", "Workload:".bold(), state.workload_name);
    println!("{}      {}", "Status:".bold(), colored_status(state.status));
    println!("{}       {}", "Phase:".bold(), state.phase);
    if let Some(started) = state.started_at {
        println!("{}     {}", "Started:".bold(), started.to_rfc3339());
    }
    if let Some(stopped) = state.stopped_at {
        println!("{}     {}", "Stopped:".bold(), stopped.to_rfc3339());
    }
    if let Some(completed) = state.completed_at {
        println!("{}   {}", "Completed:".bold(), completed.to_rfc3339());
    }
    if let Some(error) = &state.error {
        println!("{}       {}", "Error:".bold(), error.red());
    }
}
