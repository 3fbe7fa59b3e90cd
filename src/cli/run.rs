//! Run command implementation.

use super::LaunchArgs;
use clap::Args;
use vmlaunch::config::LauncherConfig;
use vmlaunch::Qemu;

/// Boot a disk image under QEMU.
#[derive(Args, Debug)]
pub struct RunCmd {
    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Hypervisor binary (overrides the configured one).
    #[arg(long, value_name = "PATH")]
    pub hypervisor: Option<String>,
}

impl RunCmd {
    /// Execute the run command.
    pub fn run(self, config: &LauncherConfig, verbose: bool) -> vmlaunch::Result<()> {
        let run = self.launch.run_config(config, verbose);
        let binary = self.hypervisor.unwrap_or_else(|| config.hypervisor.clone());

        tracing::info!(
            image = %run.image.display(),
            memory = %run.memory,
            bridged = run.bridged,
            "starting vm"
        );

        Qemu::with_binary(binary).start(&run)
    }
}
