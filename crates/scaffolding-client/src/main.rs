//! scaffolding CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use scaffolding_client::cli::{Cli, Command, RoomAction};
use scaffolding_client::commands::{self, query, room, serve};
use scaffolding_client::error::ClientResult;
use scaffolding_core::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    if let Err(e) = init_tracing(cli.tracing_config()) {
        eprintln!("warning: logging disabled: {}", e);
    }

    // Run the command
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = cli.client_config();
    let cancel = CancellationToken::new();
    commands::cancel_on_ctrl_c(cancel.clone());

    match cli.command {
        Command::Room { action } => match action {
            RoomAction::New => room::new(),
            RoomAction::Parse { code } => room::parse(&code),
        },
        Command::Serve(args) => serve::run(args, cancel).await,
        Command::Ping { target, payload } => {
            query::ping(&target.addr, payload, &config, &cancel).await
        }
        Command::Protocols { target, require } => {
            query::protocols(&target.addr, require, &config, &cancel).await
        }
        Command::Port { target } => query::port(&target.addr, &config, &cancel).await,
        Command::Players { target, json } => {
            query::players(&target.addr, json, &config, &cancel).await
        }
        Command::Announce { target, player } => {
            query::announce(&target.addr, &player, &config, &cancel).await
        }
    }
}
