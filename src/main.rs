use std::path::PathBuf;

use clap::{Parser, Subcommand};

use pcekit::cli::commands::{self, CallArgs};
use pcekit::logging;

#[derive(Parser)]
#[command(name = "pcekit", about = "Profile-based client for the PCE management API")]
struct Cli {
    /// Configuration file (default: <config dir>/pcekit/pce.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured profiles (default marked with *)
    Profiles,

    /// Set the default profile
    Default {
        /// Profile name
        name: String,
    },

    /// Send an authenticated request and print the raw response body
    Call {
        /// HTTP method (GET, POST, PUT, DELETE, ...)
        method: String,
        /// Path under /api/v2/orgs/<org>/, or a full URL
        path: String,
        /// Profile to use (uses default if omitted)
        #[arg(short, long)]
        profile: Option<String>,
        /// Request body, sent as-is with Content-Type: application/json
        #[arg(short, long)]
        data: Option<String>,
        /// Skip TLS certificate verification
        #[arg(short = 'k', long)]
        insecure: bool,
        /// Timeout in seconds (0 waits indefinitely)
        #[arg(long)]
        timeout: Option<u64>,
        /// Resolve the path under /api/v2/ instead of the org
        #[arg(long)]
        global: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing() {
        eprintln!("warning: {:#}", e);
    }

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Profiles => commands::cmd_profiles(config),
        Commands::Default { name } => commands::cmd_default(config, name),
        Commands::Call {
            method,
            path,
            profile,
            data,
            insecure,
            timeout,
            global,
        } => commands::cmd_call(
            config,
            &CallArgs {
                method,
                path,
                profile: profile.as_deref(),
                data: data.as_deref(),
                insecure: *insecure,
                timeout_secs: *timeout,
                global: *global,
            },
        ),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
