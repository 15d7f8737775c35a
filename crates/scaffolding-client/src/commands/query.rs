//! One-shot requests against a room host.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use scaffolding_core::{PlayerKind, PlayerProfile};
use scaffolding_protocol::ProtocolError;

use crate::cli::PlayerArgs;
use crate::commands::local_profile;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::socket::ScaffoldingClient;

/// Pings the host and prints the round-trip time.
pub async fn ping(
    addr: &str,
    payload: String,
    config: &ClientConfig,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let mut client = ScaffoldingClient::connect(addr, config).await?;
    let start = Instant::now();
    let echoed = client.ping(payload.into_bytes(), cancel).await?;
    println!(
        "pong from {addr}: {} bytes in {}ms",
        echoed.len(),
        start.elapsed().as_millis()
    );
    Ok(())
}

/// Prints the host's protocols, then any `required` ones it lacks.
pub async fn protocols(
    addr: &str,
    required: Vec<String>,
    config: &ClientConfig,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let mut client = ScaffoldingClient::connect(addr, config).await?;
    for tag in client.protocols(cancel).await? {
        println!("{tag}");
    }
    if !required.is_empty() {
        let missing = client.negotiate(required, cancel).await?;
        if !missing.is_empty() {
            println!("missing: {}", missing.join(", "));
        }
    }
    Ok(())
}

/// Prints the host's game-server port.
pub async fn port(addr: &str, config: &ClientConfig, cancel: &CancellationToken) -> ClientResult<()> {
    let mut client = ScaffoldingClient::connect(addr, config).await?;
    println!("{}", client.server_port(cancel).await?);
    Ok(())
}

/// Prints the room's players.
pub async fn players(
    addr: &str,
    json: bool,
    config: &ClientConfig,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let mut client = ScaffoldingClient::connect(addr, config).await?;
    let profiles = client.player_profiles(cancel).await?;
    if json {
        let rendered = serde_json::to_string_pretty(&profiles).map_err(ProtocolError::from)?;
        println!("{rendered}");
    } else {
        print!("{}", render_players(&profiles));
    }
    Ok(())
}

/// Announces the local player to the host.
pub async fn announce(
    addr: &str,
    player: &PlayerArgs,
    config: &ClientConfig,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let profile = local_profile(player);
    let mut client = ScaffoldingClient::connect(addr, config).await?;
    client.player_ping(profile.clone(), cancel).await?;
    println!("announced {} ({})", profile.name, profile.machine_id);
    Ok(())
}

/// Renders one line per player, host marked with `*`.
pub fn render_players(profiles: &[PlayerProfile]) -> String {
    if profiles.is_empty() {
        return "no players\n".to_string();
    }
    profiles
        .iter()
        .map(|p| {
            let marker = if p.kind == Some(PlayerKind::Host) { "*" } else { " " };
            format!("{marker} {} [{}] {}\n", p.name, p.vendor, p.machine_id)
        })
        .collect()
}
