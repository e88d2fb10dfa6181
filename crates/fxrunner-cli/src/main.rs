use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fxrunner::{
    log_spawn_plan, ConsoleArg, ConsoleArgEncoder, ConvarMode, ConvarPlanner, HostConfig,
    ServerConfig, SpawnPlanner, SpawnTarget, REDACTED, SECRET_CONVARS,
};
use fxrunner_contracts::{ENV_LUA_COM_TOKEN, SPAWN_PLAN_SCHEMA_VERSION};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fxrunner")]
#[command(about = "Inspect how a game server would be launched and controlled.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the executable and argument list for a configuration.
    Plan {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
        /// Server binaries directory (defaults to $TXHOST_FXS_PATH).
        #[arg(long, value_name = "PATH")]
        fxs_path: Option<PathBuf>,
        /// windows | linux (defaults to the host OS).
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print the convars derived from a configuration, one per line.
    Convars {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
        /// Command-line tokens instead of console commands.
        #[arg(long)]
        boot: bool,
    },
    /// Encode one console command line.
    Encode {
        name: String,
        /// JSON array of arguments.
        #[arg(long, value_name = "JSON")]
        args: Option<String>,
        #[arg(long)]
        legacy_semicolon_quirk: bool,
    },
}

fn main() -> std::process::ExitCode {
    init_tracing();
    match try_main() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "error: {err:#}");
            std::process::ExitCode::from(2)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let mut out = std::io::stdout().lock();

    match cli.cmd {
        Cmd::Plan {
            config,
            fxs_path,
            target,
            json,
        } => {
            let cfg = ServerConfig::from_json_file(&config)?;
            let host = host_config(fxs_path, target.as_deref())?;
            let planner =
                SpawnPlanner::default().with_span(tracing::info_span!("spawn_plan", config = %config.display()));
            let plan = planner.plan(&cfg, &host)?;
            log_spawn_plan(&plan);

            if json {
                let doc = serde_json::json!({
                    "schema_version": SPAWN_PLAN_SCHEMA_VERSION,
                    "target": host.target.to_string(),
                    "executable": plan.executable,
                    "argv": plan.redacted_argv(),
                    "data_path": plan.data_path,
                    "cfg_path": plan.cfg_path,
                    "server_name": plan.server_name,
                });
                serde_json::to_writer_pretty(&mut out, &doc).context("write plan JSON")?;
                writeln!(out)?;
            } else {
                writeln!(out, "{}", plan.executable)?;
                for row in plan.arg_table() {
                    writeln!(out, "  {}", row.join(" "))?;
                }
            }
        }
        Cmd::Convars { config, boot } => {
            let cfg = ServerConfig::from_json_file(&config)?;
            let encoder = ConsoleArgEncoder::new();
            for convar in ConvarPlanner::default().plan(&cfg) {
                let value = if SECRET_CONVARS.contains(&convar.name.as_str()) {
                    REDACTED.to_string()
                } else {
                    convar.value.clone()
                };
                if boot {
                    let setter = convar.setter_str(ConvarMode::Boot);
                    writeln!(out, "{setter} {} {value}", convar.name)?;
                } else {
                    let line = encoder.encode_command(
                        convar.setter.as_str(),
                        &[ConsoleArg::Str(convar.name.clone()), ConsoleArg::Str(value)],
                    )?;
                    writeln!(out, "{line}")?;
                }
            }
        }
        Cmd::Encode {
            name,
            args,
            legacy_semicolon_quirk,
        } => {
            let args = match args.as_deref() {
                Some(raw) => parse_args_json(raw)?,
                None => Vec::new(),
            };
            let line = ConsoleArgEncoder::new()
                .with_legacy_semicolon_quirk(legacy_semicolon_quirk)
                .encode_command(&name, &args)?;
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

fn host_config(fxs_path: Option<PathBuf>, target: Option<&str>) -> Result<HostConfig> {
    let mut host = match fxs_path {
        Some(path) => {
            let token = std::env::var(ENV_LUA_COM_TOKEN).unwrap_or_default();
            HostConfig::new(path, token)
        }
        None => HostConfig::from_env().context("resolve server binaries path")?,
    };
    if let Some(raw) = target {
        host = host.with_target(raw.parse::<SpawnTarget>()?);
    }
    Ok(host)
}

fn parse_args_json(raw: &str) -> Result<Vec<ConsoleArg>> {
    let v: Value = serde_json::from_str(raw).context("parse --args JSON")?;
    let Value::Array(items) = v else {
        anyhow::bail!("--args must be a JSON array, got {raw:?}");
    };
    Ok(items.into_iter().map(ConsoleArg::Json).collect())
}
