//! Protocol module containing the call catalogue, reply shapes, handshake
//! frames, and the binary codec.

pub mod call;
pub mod codec;
pub mod handshake;
pub mod reply;

pub use call::{Call, Opcode};
pub use codec::{decode_call, decode_reply, encode_call, encode_reply, CodecError};
pub use handshake::{Hello, Welcome};
pub use reply::{FailureCode, Reply};

/// Identifies one client rank within a coupling session.
///
/// Assigned by the server during the connection handshake, dense from zero,
/// and immutable for the lifetime of the session.  Used only to route replies
/// and to group collective calls.
pub type RankId = i32;

/// Wire protocol version carried in the first header byte.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of the fixed frame header in bytes:
/// `[version:1][tag:1][reserved:2][payload_len:4]`.
pub const HEADER_SIZE: usize = 8;

/// Upper bound on a frame payload.  A header declaring more than this is
/// rejected before any payload allocation happens.
pub const MAX_PAYLOAD: usize = 16 * 1024 * 1024;
