//! Command-line interface definition.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use scaffolding_core::{RoomId, TracingConfig};
use scaffolding_server::default_bind_addr;

use crate::config::ClientConfig;

/// Default room host address for client commands.
pub const DEFAULT_ADDR: &str = "127.0.0.1:13448";

/// scaffolding - host and query multiplayer rooms
#[derive(Debug, Parser)]
#[command(name = "scaffolding")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Connection timeout in seconds
    #[arg(long, default_value = "5", global = true)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Returns the client settings derived from the flags.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default().with_connect_timeout(Duration::from_secs(self.timeout))
    }

    /// Returns the logging setup for this invocation.
    ///
    /// Hosting uses the host profile; one-shot queries stay quiet unless
    /// something goes wrong.
    pub fn tracing_config(&self) -> TracingConfig {
        let mut config = match self.command {
            Command::Serve(_) => TracingConfig::host(),
            _ => TracingConfig::query(),
        };
        if self.debug {
            config = config.verbose();
        }
        if self.json_logs {
            config = config.json();
        }
        config
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Join code commands
    Room {
        #[command(subcommand)]
        action: RoomAction,
    },

    /// Host a room until interrupted
    Serve(ServeArgs),

    /// Check that a room host answers
    Ping {
        #[command(flatten)]
        target: Target,

        /// Payload to echo (at most 31 bytes)
        #[arg(long, default_value = "scaffolding")]
        payload: String,
    },

    /// List the protocols a room host supports
    Protocols {
        #[command(flatten)]
        target: Target,

        /// Report tags from this list the host lacks (can be repeated)
        #[arg(long, action = clap::ArgAction::Append)]
        require: Vec<String>,
    },

    /// Show the game-server port of a room host
    Port {
        #[command(flatten)]
        target: Target,
    },

    /// List the players in a room
    Players {
        #[command(flatten)]
        target: Target,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Announce yourself to a room host
    Announce {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        player: PlayerArgs,
    },
}

/// Join code actions.
#[derive(Debug, Subcommand)]
pub enum RoomAction {
    /// Generate a fresh join code
    New,

    /// Validate a join code and show its network pair
    Parse {
        /// Join code, e.g. U/YNZE-U61D-2206-HXRG
        code: String,
    },
}

/// The room host to talk to.
#[derive(Debug, Clone, Args)]
pub struct Target {
    /// Room host address
    #[arg(long, env = "SCAFFOLDING_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,
}

/// Who the local player is.
#[derive(Debug, Clone, Args)]
pub struct PlayerArgs {
    /// Player display name
    #[arg(long, env = "SCAFFOLDING_PLAYER")]
    pub player: String,

    /// Stable machine identifier (random if omitted)
    #[arg(long, env = "SCAFFOLDING_MACHINE_ID")]
    pub machine_id: Option<String>,

    /// Launcher vendor string
    #[arg(long, default_value = "scaffolding-cli")]
    pub vendor: String,
}

/// Options for hosting a room.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "SCAFFOLDING_BIND", default_value_t = default_bind_addr())]
    pub bind: SocketAddr,

    /// Local game-server port (0 when no game server runs)
    #[arg(long, env = "SCAFFOLDING_GAME_PORT", default_value_t = 0)]
    pub game_port: u16,

    #[command(flatten)]
    pub player: PlayerArgs,

    /// Reuse an existing join code instead of generating one
    #[arg(long)]
    pub code: Option<RoomId>,

    /// Maximum concurrent sessions
    #[arg(long, default_value_t = 64)]
    pub max_sessions: usize,

    /// Close sessions idle for this many seconds (0 disables)
    #[arg(long, default_value_t = 120)]
    pub idle_timeout: u64,
}
