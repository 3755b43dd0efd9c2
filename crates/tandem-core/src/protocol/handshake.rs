//! Connection handshake frames.
//!
//! Rank identity is assigned by the communication layer, not chosen by the
//! solver: a connecting client sends [`Hello`], the server answers with
//! [`Welcome`] carrying the assigned rank, the full rank population, and the
//! session's spatial dimensions.  After the handshake a connection carries
//! only call frames inbound and reply frames outbound, FIFO per rank.

use serde::{Deserialize, Serialize};

use crate::protocol::RankId;

/// Frame tag for [`Hello`].
pub const HELLO_TAG: u8 = 0x70;

/// Frame tag for [`Welcome`].
pub const WELCOME_TAG: u8 = 0x71;

/// First frame a client sends after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Human-readable solver name, for the server's session log.
    pub solver: String,
}

/// Server's answer to [`Hello`], completing the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    /// The rank assigned to this connection, dense from zero.
    pub rank: RankId,
    /// Total number of ranks the session waits for.
    pub rank_count: i32,
    /// Spatial dimensions of the session (2 or 3).
    pub dimensions: i32,
}
