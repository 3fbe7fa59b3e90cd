//! vmlaunch CLI entry point.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vmlaunch::config::LauncherConfig;

mod cli;

/// vmlaunch - QEMU launcher with host network bootstrap
#[derive(Parser, Debug)]
#[command(name = "vmlaunch")]
#[command(about = "QEMU launcher with host network bootstrap")]
#[command(version)]
struct Cli {
    /// Enable debug logging and print the hypervisor command line.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot a disk image under QEMU in the foreground.
    Run(cli::run::RunCmd),

    /// Print the QEMU invocation without running it.
    Args(cli::args::ArgsCmd),

    /// Prepare host networking for the bridged topology.
    #[command(subcommand)]
    Net(cli::net::NetCmd),

    /// Show or initialize the configuration file.
    #[command(subcommand)]
    Config(cli::config::ConfigCmd),
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    tracing::debug!(version = vmlaunch::VERSION, "starting vmlaunch");

    // Load configuration
    let config = match LauncherConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            LauncherConfig::default()
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Run(cmd) => cmd.run(&config, cli.verbose),
        Commands::Args(cmd) => cmd.run(&config),
        Commands::Net(cmd) => cmd.run(&config),
        Commands::Config(cmd) => cmd.run(&config),
    };

    // Handle errors
    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        // Launch failures were already printed by the lifecycle
        if !e.is_launch_failure() {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
fn init_logging(verbose: bool) {
    let default = if verbose { "vmlaunch=debug" } else { "vmlaunch=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
