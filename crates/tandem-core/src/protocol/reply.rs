//! Reply shapes and the wire-visible failure taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reply tags carried in the frame header tag byte (0x80 range, disjoint
/// from call opcodes and handshake tags).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyTag {
    Ack = 0x80,
    Id = 0x81,
    Size = 0x82,
    Ids = 0x83,
    Scalar = 0x84,
    Values = 0x85,
    Failure = 0x8F,
}

impl TryFrom<u8> for ReplyTag {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(ReplyTag::Ack),
            0x81 => Ok(ReplyTag::Id),
            0x82 => Ok(ReplyTag::Size),
            0x83 => Ok(ReplyTag::Ids),
            0x84 => Ok(ReplyTag::Scalar),
            0x85 => Ok(ReplyTag::Values),
            0x8F => Ok(ReplyTag::Failure),
            _ => Err(()),
        }
    }
}

/// Failure categories a server reply can carry.
///
/// `ServerUnreachable` is deliberately absent: a dead channel is detected by
/// the client locally and never crosses the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCode {
    /// The call could not be decoded (unknown opcode, unsatisfiable array
    /// count, trailing bytes).  Reported to the sender only.
    MalformedCall = 0x01,
    /// A mesh, data, or vertex id is not registered on the server.
    UnknownHandle = 0x02,
    /// Arguments decoded fine but violate an execution-time contract
    /// (dimension mismatch, non-positive time step, call out of lifecycle
    /// order).
    InvalidArgument = 0x03,
    /// A collective round was abandoned: one participant failed, supplied
    /// conflicting arguments, or left the session.  Sent to every
    /// participant of the round.
    CollectiveAborted = 0x04,
    /// A collective round stayed incomplete beyond the server's bounded
    /// wait.  Sent to every rank waiting in the round.
    Timeout = 0x05,
}

impl FailureCode {
    pub fn name(&self) -> &'static str {
        match self {
            FailureCode::MalformedCall => "malformed call",
            FailureCode::UnknownHandle => "unknown handle",
            FailureCode::InvalidArgument => "invalid argument",
            FailureCode::CollectiveAborted => "collective aborted",
            FailureCode::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for FailureCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FailureCode::MalformedCall),
            0x02 => Ok(FailureCode::UnknownHandle),
            0x03 => Ok(FailureCode::InvalidArgument),
            0x04 => Ok(FailureCode::CollectiveAborted),
            0x05 => Ok(FailureCode::Timeout),
            _ => Err(()),
        }
    }
}

/// One typed server reply, routed back to the rank(s) that own the call.
///
/// Success shapes mirror the call catalogue's reply column: bare
/// acknowledgement, a newly assigned handle, a size, handle lists, or value
/// arrays.  Every failure travels as [`Reply::Failure`] so a client can
/// always decode what went wrong instead of losing the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Operation completed, nothing to return.
    Ack,
    /// Newly assigned vertex or edge handle.
    Id(i32),
    /// Mesh vertex count.
    Size(i32),
    /// Vertex handle list (block vertex registration and position lookup).
    Ids(Vec<i32>),
    /// Single scalar value.
    Scalar(f64),
    /// Flat value array (block reads, vector reads).
    Values(Vec<f64>),
    /// Typed failure; `message` is human-readable context for logs.
    Failure { code: FailureCode, message: String },
}

impl Reply {
    /// Returns the wire tag for this reply.
    pub fn tag(&self) -> ReplyTag {
        match self {
            Reply::Ack => ReplyTag::Ack,
            Reply::Id(_) => ReplyTag::Id,
            Reply::Size(_) => ReplyTag::Size,
            Reply::Ids(_) => ReplyTag::Ids,
            Reply::Scalar(_) => ReplyTag::Scalar,
            Reply::Values(_) => ReplyTag::Values,
            Reply::Failure { .. } => ReplyTag::Failure,
        }
    }

    /// Builds a failure reply.
    pub fn failure(code: FailureCode, message: impl Into<String>) -> Self {
        Reply::Failure {
            code,
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Failure { .. })
    }
}
