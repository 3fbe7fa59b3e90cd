//! CLI command implementations.

pub mod args;
pub mod config;
pub mod net;
pub mod run;

use clap::Args;
use std::path::PathBuf;
use vmlaunch::config::{LauncherConfig, RunConfig};

/// Launch options shared by `run` and `args`.
#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Raw disk image (defaults to the configured image).
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// Guest memory size (e.g. 512M, 2G).
    #[arg(short, long, value_name = "SIZE")]
    pub memory: Option<String>,

    /// Forward a TCP port from host to guest (user-mode networking only).
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub ports: Vec<u16>,

    /// Attach the guest to the host bridge through tap0.
    #[arg(short, long)]
    pub bridged: bool,
}

impl LaunchArgs {
    /// Resolve against the launcher defaults.
    pub fn run_config(&self, config: &LauncherConfig, verbose: bool) -> RunConfig {
        let mut run = config.run_config();
        if let Some(image) = &self.image {
            run.image = image.clone();
        }
        if let Some(memory) = &self.memory {
            run.memory = memory.clone();
        }
        if self.bridged && !self.ports.is_empty() {
            tracing::warn!(ports = ?self.ports, "port forwards are ignored in bridged mode");
        }
        run.ports = self.ports.clone();
        run.bridged = self.bridged;
        run.verbose = verbose;
        run
    }
}
