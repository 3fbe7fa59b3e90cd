//! Args command implementation.

use super::LaunchArgs;
use clap::Args;
use vmlaunch::config::LauncherConfig;
use vmlaunch::Invocation;

/// Print the QEMU invocation.
#[derive(Args, Debug)]
pub struct ArgsCmd {
    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ArgsCmd {
    /// Execute the args command.
    pub fn run(self, config: &LauncherConfig) -> vmlaunch::Result<()> {
        let run = self.launch.run_config(config, false);
        let invocation = Invocation::build(&run);

        if self.json {
            let output = serde_json::json!({
                "binary": config.hypervisor,
                "args": invocation.args(),
            });
            let text = serde_json::to_string_pretty(&output)
                .map_err(|e| vmlaunch::Error::Config(format!("failed to encode JSON: {}", e)))?;
            println!("{}", text);
        } else {
            println!("{}", invocation.command_line(&config.hypervisor));
        }
        Ok(())
    }
}
