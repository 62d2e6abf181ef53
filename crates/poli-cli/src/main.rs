//! # poli-cli
//!
//! Binary entry point for the PoliTerm router.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - Session provisioning via `poli up` / `poli down`
//! - Session health checks via `poli check`
//! - Entry point to the routing engine via `poli route`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::{ColoredString, Colorize};
use tracing::info;

use poli_adapters::{SessionLauncher, TmuxEndpoint};
use poli_core::{MonitorReport, RouteConfig, RouteReport, RoutingEngine};
use poli_proto::{Endpoint, Role, TaskStatus};

#[derive(Debug, Parser)]
#[command(name = "poli", version, about = "Routes tagged message blocks between a Planner and an Executer session")]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Route one task through the Planner/Executer dialogue
    Route(RouteArgs),
    /// Bridge a Planner you drive yourself to the Executer
    Monitor(MonitorArgs),
    /// Verify that both panes are reachable
    Check(ConnArgs),
    /// Start the planner and executer sessions
    Up(UpArgs),
    /// Tear both sessions down
    Down(ConnArgs),
}

#[derive(Debug, Args)]
struct ConnArgs {
    /// tmux socket name (default: $POLI_TMUX_SOCKET or "poli")
    #[arg(long)]
    socket: Option<String>,

    /// Planner pane target (default: $POLI_PLANNER_TARGET or "planner:tui.0")
    #[arg(long)]
    planner_target: Option<String>,

    /// Executer pane target (default: $POLI_EXECUTER_TARGET or "executer:tui.0")
    #[arg(long)]
    executer_target: Option<String>,
}

impl ConnArgs {
    fn socket(&self) -> String {
        resolve(self.socket.clone(), "POLI_TMUX_SOCKET", "poli")
    }

    fn planner_target(&self) -> String {
        resolve(
            self.planner_target.clone(),
            "POLI_PLANNER_TARGET",
            "planner:tui.0",
        )
    }

    fn executer_target(&self) -> String {
        resolve(
            self.executer_target.clone(),
            "POLI_EXECUTER_TARGET",
            "executer:tui.0",
        )
    }

    fn endpoints(&self) -> (TmuxEndpoint, TmuxEndpoint) {
        let socket = self.socket();
        (
            TmuxEndpoint::new(Role::Planner, socket.clone(), self.planner_target()),
            TmuxEndpoint::new(Role::Executer, socket, self.executer_target()),
        )
    }
}

fn resolve(flag: Option<String>, env: &str, default: &str) -> String {
    flag.or_else(|| std::env::var(env).ok())
        .unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Args)]
struct RouteArgs {
    /// The task to plan and execute
    description: String,

    /// Task id (generated when omitted)
    #[arg(long)]
    task_id: Option<String>,

    /// Maximum Planner→Executer→Planner cycles
    #[arg(long, short = 'r')]
    max_rounds: Option<u32>,

    /// Planner phase budget in seconds
    #[arg(long)]
    plan_timeout: Option<f64>,

    /// Executer phase budget in seconds
    #[arg(long)]
    exec_timeout: Option<f64>,

    /// Write a JSON summary of the final task state to this path
    #[arg(long)]
    state_file: Option<PathBuf>,

    #[command(flatten)]
    conn: ConnArgs,
}

#[derive(Debug, Args)]
struct MonitorArgs {
    /// Maximum Planner→Executer→Planner cycles per task
    #[arg(long, short = 'r')]
    max_rounds: Option<u32>,

    #[command(flatten)]
    conn: ConnArgs,
}

#[derive(Debug, Args)]
struct UpArgs {
    /// Command to run in the planner session
    #[arg(long, default_value = "claude")]
    planner_cmd: String,

    /// Command to run in the executer session
    #[arg(long, default_value = "codex")]
    executer_cmd: String,

    /// Working directory for both sessions
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    #[command(flatten)]
    conn: ConnArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Route(args) => route_command(args).await,
        Commands::Monitor(args) => monitor_command(args).await,
        Commands::Check(args) => check_command(&args).await,
        Commands::Up(args) => up_command(args).await,
        Commands::Down(args) => down_command(&args).await,
    }
}

async fn route_command(args: RouteArgs) -> Result<()> {
    let mut config = RouteConfig::from_env();
    if let Some(rounds) = args.max_rounds {
        config.max_rounds = rounds;
    }
    if let Some(secs) = args.plan_timeout {
        config.plan_timeout = Duration::from_secs_f64(secs);
    }
    if let Some(secs) = args.exec_timeout {
        config.exec_timeout = Duration::from_secs_f64(secs);
    }

    let (planner, executer) = args.conn.endpoints();
    ensure_reachable(&planner).await?;
    ensure_reachable(&executer).await?;

    let task_id = args
        .task_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut engine = RoutingEngine::new(Arc::new(planner), Arc::new(executer), config);

    // Ctrl-C aborts the active task; the engine stops sending within one
    // poll interval.
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, aborting task");
            cancel.cancel();
        }
    });

    let report = engine.route(task_id, args.description).await;
    print_report(&report);

    if let Some(path) = &args.state_file {
        write_state_file(path, &report)
            .with_context(|| format!("failed to write state file {}", path.display()))?;
        info!(path = %path.display(), "state summary written");
    }

    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

async fn monitor_command(args: MonitorArgs) -> Result<()> {
    let mut config = RouteConfig::from_env();
    if let Some(rounds) = args.max_rounds {
        config.max_rounds = rounds;
    }

    let (planner, executer) = args.conn.endpoints();
    ensure_reachable(&planner).await?;
    ensure_reachable(&executer).await?;

    let mut engine = RoutingEngine::new(Arc::new(planner), Arc::new(executer), config);

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping monitor");
            cancel.cancel();
        }
    });

    println!(
        "monitoring the planner pane; talk to the Planner directly, Ctrl-C to stop"
    );
    let report = engine.monitor().await;
    print_monitor_report(&report);

    if report.reason.is_some() {
        std::process::exit(1);
    }
    Ok(())
}

async fn check_command(args: &ConnArgs) -> Result<()> {
    let (planner, executer) = args.endpoints();
    let mut ok = true;
    for endpoint in [&planner, &executer] {
        match endpoint.capture(1).await {
            Ok(_) => println!("{} {} ({})", "✓".green(), endpoint.role(), endpoint.target()),
            Err(err) => {
                println!("{} {}: {err}", "✗".red(), endpoint.role());
                ok = false;
            }
        }
    }
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn up_command(args: UpArgs) -> Result<()> {
    let dir = args
        .dir
        .canonicalize()
        .with_context(|| format!("working directory {} not found", args.dir.display()))?;
    let launcher = SessionLauncher::new(args.conn.socket());

    let planner = launcher
        .start_session(Role::Planner, &args.planner_cmd, &dir)
        .await?;
    let executer = launcher
        .start_session(Role::Executer, &args.executer_cmd, &dir)
        .await?;

    println!("{} planner session at {}", "✓".green(), planner.target());
    println!("{} executer session at {}", "✓".green(), executer.target());
    println!(
        "attach with: tmux -L {} attach -t {}",
        args.conn.socket(),
        SessionLauncher::session_name(Role::Planner)
    );
    Ok(())
}

async fn down_command(args: &ConnArgs) -> Result<()> {
    let launcher = SessionLauncher::new(args.socket());
    launcher.stop_session(Role::Planner).await?;
    launcher.stop_session(Role::Executer).await?;
    println!("{} sessions stopped", "✓".green());
    Ok(())
}

async fn ensure_reachable(endpoint: &TmuxEndpoint) -> Result<()> {
    endpoint.capture(1).await.with_context(|| {
        format!(
            "{} pane {} is not reachable; run `poli up` first",
            endpoint.role(),
            endpoint.target()
        )
    })?;
    Ok(())
}

fn status_label(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Done => "DONE".green().bold(),
        TaskStatus::TimedOut => "TIMED_OUT".yellow().bold(),
        _ => "FAILED".red().bold(),
    }
}

fn print_report(report: &RouteReport) {
    let task = &report.task;

    println!();
    println!("{}", "─".repeat(48));
    println!("  task      {}", task.id);
    println!("  status    {}", status_label(task.status));
    println!("  rounds    {}", task.round);
    println!("  messages  {}", task.history.len());
    if let Some(reason) = &report.reason {
        println!("  reason    {reason}");
    }
    println!("{}", "─".repeat(48));
}

fn print_monitor_report(report: &MonitorReport) {
    println!();
    println!("{}", "─".repeat(48));
    println!("  tasks observed  {}", report.tasks.len());
    for task in &report.tasks {
        println!(
            "  {}  {} (round {}, {} messages)",
            status_label(task.status),
            task.id,
            task.round,
            task.history.len()
        );
    }
    if let Some(reason) = &report.reason {
        println!("  stopped: {reason}");
    }
    println!("{}", "─".repeat(48));
}

fn write_state_file(path: &Path, report: &RouteReport) -> Result<()> {
    let mut entry = serde_json::Map::new();
    entry.insert("status".into(), serde_json::to_value(report.task.status)?);
    entry.insert("rounds".into(), report.task.round.into());
    entry.insert("messages".into(), report.task.history.len().into());
    if let Some(reason) = &report.reason {
        entry.insert("reason".into(), reason.clone().into());
    }

    let mut state = serde_json::Map::new();
    state.insert(report.task.id.clone(), entry.into());
    std::fs::write(
        path,
        serde_json::to_string_pretty(&serde_json::Value::Object(state))?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn route_args_parse_with_overrides() {
        let cli = Cli::parse_from([
            "poli",
            "route",
            "create hello.txt",
            "--task-id",
            "T1",
            "--max-rounds",
            "5",
            "--plan-timeout",
            "30",
        ]);
        match cli.command {
            Commands::Route(args) => {
                assert_eq!(args.description, "create hello.txt");
                assert_eq!(args.task_id.as_deref(), Some("T1"));
                assert_eq!(args.max_rounds, Some(5));
                assert_eq!(args.plan_timeout, Some(30.0));
            }
            other => panic!("expected route, got {other:?}"),
        }
    }

    #[test]
    fn monitor_args_parse() {
        let cli = Cli::parse_from(["poli", "monitor", "--max-rounds", "3"]);
        match cli.command {
            Commands::Monitor(args) => assert_eq!(args.max_rounds, Some(3)),
            other => panic!("expected monitor, got {other:?}"),
        }
    }

    #[test]
    fn state_file_summarizes_the_task() {
        let mut task = poli_proto::Task::new("T9", "x");
        task.advance_round();
        task.finalize(TaskStatus::TimedOut);
        let report = RouteReport {
            task,
            reason: Some("planning phase timed out".to_string()),
        };

        let path = std::env::temp_dir().join(format!("poli-state-{}.json", uuid::Uuid::new_v4()));
        write_state_file(&path, &report).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["T9"]["status"], "TimedOut");
        assert_eq!(json["T9"]["rounds"], 1);
        assert_eq!(json["T9"]["messages"], 0);
        assert!(
            json["T9"]["reason"]
                .as_str()
                .unwrap()
                .contains("timed out")
        );
    }

    #[test]
    fn conn_args_fall_back_to_defaults() {
        let args = ConnArgs {
            socket: None,
            planner_target: Some("custom:win.1".to_string()),
            executer_target: None,
        };
        assert_eq!(args.planner_target(), "custom:win.1");
        // Unset flags fall back to env or the documented default.
        if std::env::var("POLI_TMUX_SOCKET").is_err() {
            assert_eq!(args.socket(), "poli");
        }
    }
}
