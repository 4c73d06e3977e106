//! Service command handlers.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;
use zet_core::{Controller, Service};

use crate::cli::{GlobalOpts, ServicesArgs, ServicesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

/// A service together with the identity it is reachable through.
#[derive(Serialize)]
struct ServiceListing {
    identity: String,
    #[serde(flatten)]
    service: Service,
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Identity")]
    identity: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Intercept")]
    intercept: String,
}

impl From<&ServiceListing> for ServiceRow {
    fn from(listing: &ServiceListing) -> Self {
        let intercept = listing
            .service
            .dns
            .as_ref()
            .map(|dns| match dns.port {
                Some(port) => format!("{}:{port}", dns.hostname),
                None => dns.hostname.clone(),
            })
            .unwrap_or_default();
        Self {
            identity: listing.identity.clone(),
            id: listing.service.id.clone(),
            name: listing.service.name.clone(),
            intercept,
        }
    }
}

pub async fn handle(
    controller: &Controller,
    args: ServicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ServicesCommand::List { id } => {
            util::await_settled(controller, Duration::from_secs(global.wait)).await;
            let listings: Vec<ServiceListing> = match id {
                Some(id) => {
                    let services = controller
                        .services(&id)
                        .ok_or_else(|| CliError::NotFound { id: id.clone() })?;
                    services
                        .into_iter()
                        .map(|service| ServiceListing {
                            identity: id.clone(),
                            service,
                        })
                        .collect()
                }
                None => controller
                    .identities_snapshot()
                    .iter()
                    .flat_map(|identity| {
                        identity.services.values().map(move |service| ServiceListing {
                            identity: identity.id.clone(),
                            service: service.clone(),
                        })
                    })
                    .collect(),
            };

            let out = output::render_list(
                &global.output,
                &listings,
                |l| ServiceRow::from(l),
                |l| l.service.id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
