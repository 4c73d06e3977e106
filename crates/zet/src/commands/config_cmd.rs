//! Config subcommand handlers. None of these touch the engine.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Settings};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { force } => {
            let path = config::settings_path(global);
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!("{} already exists (use --force to overwrite)", path.display()),
                });
            }
            config::save_settings(&Settings::default(), &path)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let settings = config::resolve_settings(global)?;
            let text = settings_toml(&settings)?;
            let out = output::render_single(
                &global.output,
                &settings,
                |_| text.clone(),
                |s| s.storage.state_dir.display().to_string(),
            )?;
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = config::settings_path(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
    }
}

fn settings_toml(settings: &Settings) -> Result<String, CliError> {
    toml::to_string_pretty(settings).map_err(|e| CliError::Internal {
        message: format!("cannot render settings as TOML: {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_render_as_toml() {
        let text = settings_toml(&Settings::default()).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Settings::default());
    }
}
