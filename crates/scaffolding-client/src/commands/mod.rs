//! Subcommand implementations.

pub mod query;
pub mod room;
pub mod serve;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scaffolding_core::PlayerProfile;

use crate::cli::PlayerArgs;

/// Cancels `cancel` when the process receives Ctrl-C.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}

/// Builds the local player's profile, inventing a machine id when none was given.
pub fn local_profile(args: &PlayerArgs) -> PlayerProfile {
    let machine_id = match &args.machine_id {
        Some(id) if !id.trim().is_empty() => id.clone(),
        _ => format!("{:016x}", rand::random::<u64>()),
    };
    PlayerProfile::new(&args.player, machine_id, &args.vendor)
}
