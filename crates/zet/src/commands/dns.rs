//! DNS command handlers.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use zet_core::{Controller, DnsSettings};

use crate::cli::{DnsArgs, DnsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// `show` and `set`: persisted settings only, no engine round trip.
pub fn handle_settings(
    controller: &Controller,
    command: &DnsCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match command {
        DnsCommand::Show => {
            let dns = controller.dns_settings()?;
            print_settings(&dns, global)
        }

        DnsCommand::Set { nameserver, range } => {
            let dns = validate(nameserver, range)?;
            controller.set_dns_settings(&dns)?;
            if !global.quiet {
                eprintln!("DNS settings saved; they apply the next time the engine starts");
            }
            print_settings(&dns, global)
        }

        DnsCommand::Upstream { .. } => Err(CliError::Internal {
            message: "upstream DNS needs a running engine".into(),
        }),
    }
}

pub async fn handle_upstream(
    controller: &Controller,
    args: DnsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let DnsCommand::Upstream { servers } = args.command else {
        return handle_settings(controller, &args.command, global);
    };
    controller.set_upstream_dns(servers).await?;
    if !global.quiet {
        eprintln!("Upstream resolvers updated");
    }
    Ok(())
}

fn print_settings(dns: &DnsSettings, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        &global.output,
        dns,
        |d| format!("Nameserver:  {}\nRange:       {}", d.nameserver, d.range),
        |d| d.nameserver.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Check that `nameserver` is an address inside the CIDR `range`.
fn validate(nameserver: &str, range: &str) -> Result<DnsSettings, CliError> {
    let invalid = |field: &str, reason: String| CliError::Validation {
        field: field.into(),
        reason,
    };

    let addr: IpAddr = nameserver
        .parse()
        .map_err(|_| invalid("nameserver", format!("'{nameserver}' is not an IP address")))?;
    let network: IpNetwork = range
        .parse()
        .map_err(|e| invalid("range", format!("'{range}' is not a CIDR range: {e}")))?;

    if !network.contains(addr) {
        return Err(invalid(
            "nameserver",
            format!("{nameserver} is outside {network}"),
        ));
    }

    Ok(DnsSettings {
        nameserver: nameserver.to_owned(),
        range: range.to_owned(),
    })
}
