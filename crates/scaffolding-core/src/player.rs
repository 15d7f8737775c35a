//! Player profiles exchanged between room peers.

use serde::{Deserialize, Serialize};

/// Role of a player inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerKind {
    /// The player hosting the game server.
    Host,
    /// A remote player that joined the room.
    Guest,
}

/// A player's self-description, announced with `player_ping`.
///
/// On the wire this is a JSON object with snake_case keys; `kind` is
/// omitted when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Display name.
    pub name: String,
    /// Stable identifier of the player's machine.
    pub machine_id: String,
    /// Launcher or client vendor string.
    #[serde(default)]
    pub vendor: String,
    /// Role in the room, assigned by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PlayerKind>,
}

impl PlayerProfile {
    /// Creates a profile without a role.
    pub fn new(
        name: impl Into<String>,
        machine_id: impl Into<String>,
        vendor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            machine_id: machine_id.into(),
            vendor: vendor.into(),
            kind: None,
        }
    }

    /// Returns the profile with the given role.
    #[must_use]
    pub fn with_kind(mut self, kind: PlayerKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Returns true if the profile carries a machine id.
    pub fn has_machine_id(&self) -> bool {
        !self.machine_id.trim().is_empty()
    }

    /// Returns true if this profile belongs to the room host.
    pub fn is_host(&self) -> bool {
        self.kind == Some(PlayerKind::Host)
    }
}
