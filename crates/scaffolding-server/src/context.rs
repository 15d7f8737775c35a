//! Per-room state shared by every session of a hosted room.
//!
//! Only the roster changes once the room is running. Room metadata, the
//! supported protocol list and the game-server port are fixed when the
//! context is built and are read without synchronization.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use scaffolding_core::{PlayerKind, PlayerProfile, RoomId};
use scaffolding_protocol::RequestKind;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Opaque identifier of one connected stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Reserved for the room host's own roster entry.
    pub const HOST: SessionId = SessionId(0);

    /// Wraps a raw session number.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw session number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Players currently in the room, keyed by session.
///
/// Synchronization is internal; callers never hold a lock.
#[derive(Debug, Default)]
pub struct Roster {
    entries: RwLock<HashMap<SessionId, PlayerProfile>>,
}

impl Roster {
    /// Creates an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the profile of `session`.
    ///
    /// Returns the previous profile, if any.
    pub async fn upsert(&self, session: SessionId, profile: PlayerProfile) -> Option<PlayerProfile> {
        let previous = self.entries.write().await.insert(session, profile);
        debug!(
            session = %session,
            updated = previous.is_some(),
            "Roster entry stored"
        );
        previous
    }

    /// Removes the profile of `session`.
    pub async fn remove(&self, session: SessionId) -> Option<PlayerProfile> {
        self.entries.write().await.remove(&session)
    }

    /// Returns the profile of `session`.
    pub async fn get(&self, session: SessionId) -> Option<PlayerProfile> {
        self.entries.read().await.get(&session).cloned()
    }

    /// Returns every profile, ordered by session (the host comes first).
    pub async fn profiles(&self) -> Vec<PlayerProfile> {
        let entries = self.entries.read().await;
        let mut sessions: Vec<_> = entries.iter().collect();
        sessions.sort_by_key(|(session, _)| **session);
        sessions
            .into_iter()
            .map(|(_, profile)| profile.clone())
            .collect()
    }

    /// Returns the number of players.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nobody is in the room.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes every entry and returns how many there were.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }
}

/// Metadata fixed at room creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// Room name/secret pair.
    pub room_id: RoomId,
    /// Display name of the hosting player.
    pub host_name: String,
}

/// State shared by every request handler of a hosted room.
#[derive(Debug)]
pub struct ServerContext {
    room: RoomInfo,
    protocols: Vec<String>,
    server_port: u16,
    roster: Roster,
}

/// Shared context wrapped in an Arc.
pub type SharedContext = Arc<ServerContext>;

impl ServerContext {
    /// Starts building a context for `room_id`.
    pub fn builder(room_id: RoomId) -> ContextBuilder {
        ContextBuilder {
            room_id,
            host_name: String::new(),
            server_port: 0,
            protocols: None,
        }
    }

    /// Returns the room metadata.
    pub fn room(&self) -> &RoomInfo {
        &self.room
    }

    /// Returns the request tags this host supports.
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Returns the local game-server port, or `None` if nothing is bound.
    pub fn server_port(&self) -> Option<u16> {
        (self.server_port != 0).then_some(self.server_port)
    }

    /// Returns the roster.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Adds the room owner to the roster as the host.
    ///
    /// This is the only path that assigns [`PlayerKind::Host`].
    pub async fn register_host(&self, profile: PlayerProfile) {
        let profile = profile.with_kind(PlayerKind::Host);
        info!(
            name = %profile.name,
            machine_id = %profile.machine_id,
            "Registering room host"
        );
        self.roster.upsert(SessionId::HOST, profile).await;
    }
}

/// Builder for [`ServerContext`].
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    room_id: RoomId,
    host_name: String,
    server_port: u16,
    protocols: Option<Vec<String>>,
}

impl ContextBuilder {
    /// Builder: set the host player's display name.
    pub fn host_name(mut self, name: impl Into<String>) -> Self {
        self.host_name = name.into();
        self
    }

    /// Builder: set the local game-server port (0 means none).
    pub fn server_port(mut self, port: u16) -> Self {
        self.server_port = port;
        self
    }

    /// Builder: set the supported protocol tags.
    ///
    /// Defaults to every built-in request tag.
    pub fn protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = Some(protocols.into_iter().map(Into::into).collect());
        self
    }

    /// Builds the context.
    pub fn build(self) -> ServerContext {
        ServerContext {
            room: RoomInfo {
                room_id: self.room_id,
                host_name: self.host_name,
            },
            protocols: self.protocols.unwrap_or_else(RequestKind::all_tags),
            server_port: self.server_port,
            roster: Roster::new(),
        }
    }

    /// Builds the context behind an Arc.
    pub fn shared(self) -> SharedContext {
        Arc::new(self.build())
    }
}
