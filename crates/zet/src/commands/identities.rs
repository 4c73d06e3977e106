//! Identity command handlers.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tabled::Tabled;
use zet_core::{Controller, Identity};

use crate::cli::{GlobalOpts, IdentitiesArgs, IdentitiesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct IdentityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Services")]
    services: usize,
    #[tabled(rename = "Controller")]
    controller: String,
}

impl IdentityRow {
    pub(crate) fn new(identity: &Identity, color: bool) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.display_name.clone(),
            status: output::status_label(&identity.status, color),
            services: identity.services.len(),
            controller: identity.controller_address.clone(),
        }
    }
}

fn detail(identity: &Identity, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ID:          {}", identity.id);
    let _ = writeln!(out, "Name:        {}", identity.display_name);
    let _ = writeln!(out, "Key:         {}", identity.derived_name);
    let _ = writeln!(
        out,
        "Status:      {}",
        output::status_label(&identity.status, color)
    );
    let _ = writeln!(out, "Enabled:     {}", identity.enabled);
    if !identity.controller_address.is_empty() {
        let _ = writeln!(out, "Controller:  {}", identity.controller_address);
    }
    if let Some(at) = identity.last_event {
        let _ = writeln!(out, "Last event:  {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    let _ = write!(out, "Services:    {}", identity.services.len());
    for service in identity.services.values() {
        let _ = write!(out, "\n  - {} ({})", service.name, service.id);
    }
    out
}

fn print_identity(identity: &Identity, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        identity,
        |i| detail(i, color),
        |i| i.id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn lookup(controller: &Controller, id: &str) -> Result<Arc<Identity>, CliError> {
    controller
        .identity(id)
        .ok_or_else(|| CliError::NotFound { id: id.to_owned() })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: IdentitiesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        IdentitiesCommand::List { filter } => {
            util::await_settled(controller, Duration::from_secs(global.wait)).await;
            let snap = controller
                .identities()
                .filtered(&util::identity_filter(filter));

            let color = output::should_color(&global.color);
            let out = output::render_list(
                &global.output,
                &snap,
                |i| IdentityRow::new(i, color),
                |i| i.id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        IdentitiesCommand::Get { id } => {
            util::await_settled(controller, Duration::from_secs(global.wait)).await;
            let identity = lookup(controller, &id)?;
            print_identity(&identity, global)
        }

        IdentitiesCommand::Enroll { jwt } => {
            let token = util::read_token(&jwt)?;
            let config = controller.enroll(token).await?;
            if !global.quiet {
                eprintln!("Enrolled {}", config.key_alias());
            }
            util::await_settled(controller, Duration::from_secs(global.wait)).await;
            let identity = lookup(controller, config.key_alias())?;
            print_identity(&identity, global)
        }

        IdentitiesCommand::Enable { id } => {
            let identity = controller.set_enabled(id, true).await?;
            print_identity(&identity, global)
        }

        IdentitiesCommand::Disable { id } => {
            let identity = controller.set_enabled(id, false).await?;
            print_identity(&identity, global)
        }

        IdentitiesCommand::Delete { id } => {
            lookup(controller, &id)?;
            if !util::confirm(
                &format!("Delete identity '{id}' and its stored credentials?"),
                "identities delete",
                global.yes,
            )? {
                return Ok(());
            }
            controller.delete(id.as_str()).await?;
            if !global.quiet {
                eprintln!("Identity deleted");
            }
            Ok(())
        }

        IdentitiesCommand::Refresh { id } => {
            controller.refresh(id).await?;
            if !global.quiet {
                eprintln!("Refresh requested");
            }
            Ok(())
        }

        IdentitiesCommand::Dump { id } => {
            let text = controller.dump(id).await?;
            output::print_output(&text, global.quiet);
            Ok(())
        }
    }
}
