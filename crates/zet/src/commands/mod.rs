//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod config_cmd;
pub mod dns;
pub mod identities;
pub mod services;
pub mod util;
pub mod watch;

use zet_core::Controller;

use crate::cli::{Command, DnsCommand, GlobalOpts};
use crate::error::CliError;

/// Dispatch an engine-bound command.
///
/// DNS `show`/`set` only touch the preference store. Everything else
/// starts the controller first and shuts it down afterwards.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Command::Dns(ref args) = cmd {
        if !matches!(args.command, DnsCommand::Upstream { .. }) {
            return dns::handle_settings(controller, &args.command, global);
        }
    }

    if let Err(e) = controller.start().await {
        controller.shutdown().await;
        return Err(e.into());
    }
    let result = run_started(cmd, controller, global).await;
    controller.shutdown().await;
    result
}

async fn run_started(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Identities(args) => identities::handle(controller, args, global).await,
        Command::Services(args) => services::handle(controller, args, global).await,
        Command::Dns(args) => dns::handle_upstream(controller, args, global).await,
        Command::Watch(args) => watch::handle(controller, args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "config and completions run without the engine".into(),
        }),
    }
}
