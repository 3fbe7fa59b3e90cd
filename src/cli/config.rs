//! Config command implementation.

use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use vmlaunch::config::LauncherConfig;
use vmlaunch::{Error, Result};

/// Manage the launcher configuration file
#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    /// Print the effective configuration as TOML.
    Show,

    /// Write the default configuration file.
    Init(InitCmd),
}

impl ConfigCmd {
    /// Execute the config subcommand.
    pub fn run(self, config: &LauncherConfig) -> Result<()> {
        match self {
            ConfigCmd::Show => {
                let text = toml::to_string_pretty(config)
                    .map_err(|e| Error::Config(format!("failed to encode config: {}", e)))?;
                print!("{}", text);
                Ok(())
            }
            ConfigCmd::Init(cmd) => cmd.run(),
        }
    }
}

/// Write a default config file.
#[derive(Args, Debug)]
pub struct InitCmd {
    /// Config file path (defaults to the user config directory).
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file.
    #[arg(short, long)]
    pub force: bool,
}

impl InitCmd {
    /// Execute the init command.
    pub fn run(self) -> Result<()> {
        let path = match self.path {
            Some(path) => path,
            None => LauncherConfig::default_path()?,
        };
        init_at(&path, self.force)?;
        println!("Wrote {}", path.display());
        Ok(())
    }
}

fn init_at(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    LauncherConfig::default().save_to(path)
}
