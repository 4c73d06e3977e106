//! `zet watch`: print identity snapshots and throughput until Ctrl-C.

use std::sync::Arc;

use chrono::Local;
use futures_util::StreamExt;
use tracing::debug;
use zet_core::{Controller, Identity, IdentityFilter, TunnelRates};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::identities::IdentityRow;
use super::util;

pub async fn handle(
    controller: &Controller,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let filter = util::identity_filter(args.filter);
    // The first item is the current snapshot.
    let mut identities = controller.identities().into_stream();
    let mut rates = controller.rates();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted; leaving watch");
                break;
            }
            snapshot = identities.next() => {
                let Some(snapshot) = snapshot else { break };
                print_snapshot(&snapshot, &filter, global)?;
            }
            changed = rates.changed(), if args.rates => {
                if changed.is_err() {
                    break;
                }
                let sample = *rates.borrow_and_update();
                print_rates(sample, global)?;
            }
        }
    }
    Ok(())
}

fn print_snapshot(
    snapshot: &[Arc<Identity>],
    filter: &IdentityFilter,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let visible: Vec<Arc<Identity>> = snapshot
        .iter()
        .filter(|identity| filter.matches(identity))
        .cloned()
        .collect();

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &visible,
        |i| IdentityRow::new(i, color),
        |i| format!("{} {}", i.id, i.status),
    )?;

    if matches!(global.output, OutputFormat::Table) && !global.quiet {
        println!("── {} ──", Local::now().format("%H:%M:%S"));
    }
    output::print_output(&out, global.quiet);
    Ok(())
}

fn print_rates(sample: TunnelRates, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        &global.output,
        &sample,
        |r| {
            format!(
                "up {}  down {}",
                util::format_rate(r.up),
                util::format_rate(r.down)
            )
        },
        |r| format!("{} {}", r.up, r.down),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
