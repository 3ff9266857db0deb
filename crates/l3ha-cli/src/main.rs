use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::error;

mod commands;
mod logging;
mod settings;

/// Exit code for bad command-line usage.
const EXIT_USAGE: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "l3ha",
    about = "Keep L3 agent routers on live agents",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct GlobalArgs {
    /// How to choose a destination agent
    #[arg(long, value_enum, global = true, default_value_t = SelectionMode::LeastBusy)]
    agent_selection_mode: SelectionMode,

    /// Send every router to this agent (id or host)
    #[arg(long, global = true, value_name = "ID|HOST")]
    target_agent: Option<String>,

    /// Only touch the router ids listed in this file, one per line
    #[arg(long, global = true, value_name = "FILE")]
    router_list: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// PEM bundle to trust when talking to the API
    #[arg(long, global = true, value_name = "FILE")]
    ca_cert: Option<PathBuf>,

    /// Networking API endpoint
    #[arg(long, global = true, env = "OS_NETWORK_ENDPOINT")]
    endpoint: Option<String>,

    /// Pre-issued API token
    #[arg(long, global = true, env = "OS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// TOML config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log the moves without making them
    #[arg(long, global = true)]
    noop: bool,

    /// After each move, wait until the router's ports and floating IPs
    /// are active
    #[arg(long, global = true)]
    wait_for_router: bool,

    /// Show debugging output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    debug: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move routers off dead agents onto live ones
    Migrate {
        /// Attach immediately instead of waiting for ports to drain
        #[arg(long)]
        now: bool,
    },
    /// Move every router off one host
    Evacuate {
        /// Host whose agent should be emptied
        host: String,
    },
    /// Suggest router moves that keep traffic inside its availability
    /// zones. Changes nothing.
    Optimize {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Exit 2 if any router sits on a dead agent. Changes nothing.
    Check,
    /// Even out router counts across live agents
    Rebalance,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
enum SelectionMode {
    #[default]
    LeastBusy,
    Random,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    if let Err(e) = logging::init(&cli.global) {
        eprintln!("failed to set up logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match commands::run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{e:#}"), "l3ha failed");
            if e.downcast_ref::<settings::UsageError>().is_some() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
