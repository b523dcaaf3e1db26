//! Config command - inspect resolved settings

use anyhow::Result;

use crate::Context as AppContext;
use crate::cli::ConfigCommand;
use crate::config::Settings;
use crate::paths;
use crate::ui;

pub fn run(ctx: &AppContext, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => {
            let settings = Settings::resolve(&args)?;
            print!("{}", settings.to_toml()?);
            Ok(())
        }
        ConfigCommand::Path => {
            let path = paths::config_file()?;
            println!("{}", path.display());
            if !ctx.quiet && !path.exists() {
                ui::dim("(not present - built-in defaults are used)");
            }
            Ok(())
        }
    }
}
