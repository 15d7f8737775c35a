//! `serve` subcommand: host a room in the foreground.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use scaffolding_core::RoomId;
use scaffolding_server::{
    RequestHandler, ServerConfig, ServerContext, SocketServer, make_connection_handler,
};

use crate::cli::ServeArgs;
use crate::commands::local_profile;
use crate::error::ClientResult;

/// Hosts a room until `cancel` fires.
pub async fn run(args: ServeArgs, cancel: CancellationToken) -> ClientResult<()> {
    let room = args.code.clone().unwrap_or_else(RoomId::generate);
    let host = local_profile(&args.player);

    let context = ServerContext::builder(room.clone())
        .host_name(&host.name)
        .server_port(args.game_port)
        .shared();
    context.register_host(host).await;

    let idle_timeout = (args.idle_timeout > 0).then(|| Duration::from_secs(args.idle_timeout));
    let config = ServerConfig::new(args.bind)
        .with_max_sessions(args.max_sessions)
        .with_idle_timeout(idle_timeout);
    let server = SocketServer::new(config).await?;

    println!("Hosting room {}", room.code());
    println!("  listening on {}", server.local_addr()?);
    println!("  network {} / {}", room.network_name(), room.network_secret());
    if let Some(port) = context.server_port() {
        println!("  game server port {port}");
    }

    let handler = make_connection_handler::<TcpStream>(RequestHandler::new(context.clone()));
    let result = server.run(handler, cancel).await;
    close_room(&context).await;
    result?;
    Ok(())
}

/// Empties the roster once the accept loop has stopped.
async fn close_room(context: &ServerContext) -> usize {
    let departed = context.roster().clear().await;
    info!(code = %context.room().room_id.code(), departed, "Room host stopped");
    departed
}
