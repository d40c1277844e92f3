//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use tamper_kill_switch::core::config::Config;
use tamper_kill_switch::daemon::signals::SignalHandler;
use tamper_kill_switch::daemon::watch::{InspectOutcome, PollLoop, stop_channel};
use tamper_kill_switch::kill::notify::make_sink;
use tamper_kill_switch::kill::{KillCoordinator, SystemPower};
use tamper_kill_switch::sampler::detect_sampler;
use tamper_kill_switch::verdict::Verdict;

/// Tamper Kill Switch — powers the host off when its hardware state drifts.
#[derive(Debug, Parser)]
#[command(
    name = "tks",
    author,
    version,
    about = "Tamper Kill Switch - Dead-man's Switch Watchdog",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the enforcement loop. A violation powers the host off.
    Watch,
    /// Run one full diagnostic cycle. Never powers off.
    Inspect,
    /// View and validate configuration state.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the effective config file path.
    Path,
    /// Print the effective configuration as TOML.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct VersionArgs {
    /// Include build metadata.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Watch => run_watch(cli),
        Command::Inspect => run_inspect(cli),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_watch(cli: &Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref()).map_err(|e| CliError::User(e.to_string()))?;
    let sampler = detect_sampler(&config).map_err(|e| CliError::Runtime(e.to_string()))?;

    let sink = make_sink(&config.email);
    let power = SystemPower;
    let mut coordinator = KillCoordinator::new(sink.as_ref(), &power, &config.global);

    let (stop_tx, stop_rx) = stop_channel();
    let signals = SignalHandler::new(stop_tx);
    let poll = PollLoop::new(config, sampler, stop_rx);

    poll.run(&signals, &mut coordinator)
        .map_err(|e| CliError::Runtime(e.to_string()))
}

fn run_inspect(cli: &Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref()).map_err(|e| CliError::User(e.to_string()))?;
    let hash = config
        .stable_hash()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let sampler = detect_sampler(&config).map_err(|e| CliError::Runtime(e.to_string()))?;

    let (_stop_tx, stop_rx) = stop_channel();
    let poll = PollLoop::new(config, sampler, stop_rx);
    let reports = poll.inspect();

    let violations = reports
        .iter()
        .filter(|r| {
            matches!(
                &r.outcome,
                InspectOutcome::Evaluated {
                    verdict: Verdict::Violation(_),
                    ..
                }
            )
        })
        .count();

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                println!("Inspecting host state (config {hash})");
                println!();
            }
            for report in &reports {
                let label = format!("{:>9}", report.kind.to_string());
                match &report.outcome {
                    InspectOutcome::Unsupported => {
                        println!("  {label}  {}", "unsupported on this platform".dimmed());
                    }
                    InspectOutcome::Unavailable => {
                        println!("  {label}  {}", "hardware absent".dimmed());
                    }
                    InspectOutcome::Failed { details } => {
                        println!("  {label}  {} {details}", "SAMPLER FAILED".red().bold());
                    }
                    InspectOutcome::Evaluated { verdict, .. } => match verdict {
                        Verdict::Ok => println!("  {label}  {}", "ok".green()),
                        Verdict::Violation(v) => {
                            println!("  {label}  {} {v}", "VIOLATION".red().bold());
                        }
                    },
                }
            }
            if !cli.quiet {
                println!();
                if violations == 0 {
                    println!("{}", "No violations detected.".green());
                } else {
                    println!("{}", format!("{violations} violation(s) detected.").red());
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "inspect",
                "config_hash": hash,
                "violations": violations,
                "signals": serde_json::to_value(&reports)?,
            });
            write_json_line(&payload)?;
        }
    }

    // Inspection is diagnostic only: violations are reported, not fatal,
    // and the exit code stays zero.
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config =
                Config::load(cli.config.as_deref()).map_err(|e| CliError::User(e.to_string()))?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("tks {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "tks",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("TKS_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        Some("auto") | None => fallback,
        Some(_) => fallback,
    }
}
