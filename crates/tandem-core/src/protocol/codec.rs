//! Binary codec for encoding and decoding coupling protocol frames.
//!
//! Wire format:
//! ```text
//! [version:1][tag:1][reserved:2][payload_len:4][payload:N]
//! ```
//! Total header size: 8 bytes. All multi-byte integers are big-endian and
//! doubles travel as big-endian IEEE-754 bit patterns. Arrays are encoded as
//! `(count: i32, count × element)`; strings as an `i32` byte count followed
//! by UTF-8 bytes. The count is always validated against the remaining
//! payload before any element is read.

use thiserror::Error;

use crate::protocol::call::{Call, Opcode};
use crate::protocol::handshake::{Hello, Welcome, HELLO_TAG, WELCOME_TAG};
use crate::protocol::reply::{FailureCode, Reply, ReplyTag};
use crate::protocol::{HEADER_SIZE, MAX_PAYLOAD, PROTOCOL_VERSION};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The tag byte in the header is not a recognized call, reply, or
    /// handshake tag.
    #[error("unknown frame tag: 0x{0:02X}")]
    UnknownTag(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// An array or string length prefix was negative.
    #[error("negative element count: {0}")]
    NegativeCount(i32),

    /// The payload could not be parsed (UTF-8 error, unknown failure code,
    /// trailing bytes, ...).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload length field does not match the data available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The declared payload exceeds [`MAX_PAYLOAD`].
    #[error("frame too large: {declared} bytes exceeds the {max} byte limit")]
    FrameTooLarge { declared: usize, max: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Call`] into a byte vector including the 8-byte header.
///
/// # Errors
///
/// Returns [`CodecError::FrameTooLarge`] if the payload exceeds
/// [`MAX_PAYLOAD`]; encoding cannot fail otherwise.
///
/// # Examples
///
/// ```rust
/// use tandem_core::protocol::{decode_call, encode_call, Call};
///
/// let call = Call::Advance { dt: 0.01 };
/// let bytes = encode_call(&call).unwrap();
/// let (decoded, consumed) = decode_call(&bytes).unwrap();
/// assert_eq!(decoded, call);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_call(call: &Call) -> Result<Vec<u8>, CodecError> {
    let mut payload = Vec::new();
    encode_call_payload(&mut payload, call);
    build_frame(call.opcode() as u8, payload)
}

/// Decodes one [`Call`] from the beginning of `bytes`.
///
/// Returns the decoded call and the total number of bytes consumed (header +
/// payload), so a streaming caller can advance its read cursor.
///
/// # Errors
///
/// Returns [`CodecError`] if the bytes are malformed; decoding has no side
/// effects beyond consuming input, so the caller may continue with the next
/// frame.
pub fn decode_call(bytes: &[u8]) -> Result<(Call, usize), CodecError> {
    let (tag, payload, consumed) = split_frame(bytes)?;
    let opcode = Opcode::try_from(tag).map_err(|_| CodecError::UnknownTag(tag))?;
    let call = decode_call_payload(opcode, payload)?;
    Ok((call, consumed))
}

/// Encodes a [`Reply`] into a byte vector including the 8-byte header.
pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>, CodecError> {
    let mut payload = Vec::new();
    encode_reply_payload(&mut payload, reply);
    build_frame(reply.tag() as u8, payload)
}

/// Decodes one [`Reply`] from the beginning of `bytes`.
pub fn decode_reply(bytes: &[u8]) -> Result<(Reply, usize), CodecError> {
    let (tag, payload, consumed) = split_frame(bytes)?;
    let reply_tag = ReplyTag::try_from(tag).map_err(|_| CodecError::UnknownTag(tag))?;
    let reply = decode_reply_payload(reply_tag, payload)?;
    Ok((reply, consumed))
}

/// Encodes a handshake [`Hello`] frame.
pub fn encode_hello(hello: &Hello) -> Result<Vec<u8>, CodecError> {
    let mut payload = Vec::new();
    write_string(&mut payload, &hello.solver);
    build_frame(HELLO_TAG, payload)
}

/// Decodes a handshake [`Hello`] frame.
pub fn decode_hello(bytes: &[u8]) -> Result<(Hello, usize), CodecError> {
    let (tag, payload, consumed) = split_frame(bytes)?;
    if tag != HELLO_TAG {
        return Err(CodecError::UnknownTag(tag));
    }
    let (solver, end) = read_string(payload, 0)?;
    ensure_consumed(payload, end, "hello")?;
    Ok((Hello { solver }, consumed))
}

/// Encodes a handshake [`Welcome`] frame.
pub fn encode_welcome(welcome: &Welcome) -> Result<Vec<u8>, CodecError> {
    let mut payload = Vec::new();
    write_i32(&mut payload, welcome.rank);
    write_i32(&mut payload, welcome.rank_count);
    write_i32(&mut payload, welcome.dimensions);
    build_frame(WELCOME_TAG, payload)
}

/// Decodes a handshake [`Welcome`] frame.
pub fn decode_welcome(bytes: &[u8]) -> Result<(Welcome, usize), CodecError> {
    let (tag, payload, consumed) = split_frame(bytes)?;
    if tag != WELCOME_TAG {
        return Err(CodecError::UnknownTag(tag));
    }
    let (rank, off) = read_i32(payload, 0)?;
    let (rank_count, off) = read_i32(payload, off)?;
    let (dimensions, end) = read_i32(payload, off)?;
    ensure_consumed(payload, end, "welcome")?;
    Ok((
        Welcome {
            rank,
            rank_count,
            dimensions,
        },
        consumed,
    ))
}

/// Validates a frame header and returns the payload length that follows it.
///
/// Transport code reads the fixed-size header first and then issues an exact
/// read for the payload; this rejects bad versions and oversized frames
/// before any payload allocation.
pub fn frame_payload_len(header: &[u8; HEADER_SIZE]) -> Result<usize, CodecError> {
    if header[0] != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion(header[0]));
    }
    let declared = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if declared > MAX_PAYLOAD {
        return Err(CodecError::FrameTooLarge {
            declared,
            max: MAX_PAYLOAD,
        });
    }
    Ok(declared)
}

// ── Frame assembly ────────────────────────────────────────────────────────────

fn build_frame(tag: u8, payload: Vec<u8>) -> Result<Vec<u8>, CodecError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(CodecError::FrameTooLarge {
            declared: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(PROTOCOL_VERSION);
    buf.push(tag);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn split_frame(bytes: &[u8]) -> Result<(u8, &[u8], usize), CodecError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let tag = bytes[1];

    // bytes[2..4] are reserved – ignored on decode

    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if payload_len > MAX_PAYLOAD {
        return Err(CodecError::FrameTooLarge {
            declared: payload_len,
            max: MAX_PAYLOAD,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if bytes.len() < total {
        return Err(CodecError::PayloadLengthMismatch {
            declared: payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    Ok((tag, &bytes[HEADER_SIZE..total], total))
}

// ── Call payload encoding ─────────────────────────────────────────────────────

fn encode_call_payload(buf: &mut Vec<u8>, call: &Call) {
    match call {
        Call::Ping | Call::Initialize | Call::InitializeData | Call::Finalize => {}
        Call::Advance { dt } => write_f64(buf, *dt),
        Call::FulfilledAction { action } => write_string(buf, action),
        Call::SetMeshVertex { mesh_id, position } => {
            write_i32(buf, *mesh_id);
            write_f64_array(buf, position);
        }
        Call::GetMeshVertexSize { mesh_id }
        | Call::ResetMesh { mesh_id }
        | Call::MapWriteDataFrom { mesh_id }
        | Call::MapReadDataTo { mesh_id } => write_i32(buf, *mesh_id),
        Call::SetMeshVertices { mesh_id, positions }
        | Call::GetMeshVertexIdsFromPositions { mesh_id, positions } => {
            write_i32(buf, *mesh_id);
            write_f64_array(buf, positions);
        }
        Call::GetMeshVertices { mesh_id, ids } => {
            write_i32(buf, *mesh_id);
            write_i32_array(buf, ids);
        }
        Call::SetMeshEdge {
            mesh_id,
            first_vertex,
            second_vertex,
        } => {
            write_i32(buf, *mesh_id);
            write_i32(buf, *first_vertex);
            write_i32(buf, *second_vertex);
        }
        Call::SetMeshTriangle {
            mesh_id,
            first_edge,
            second_edge,
            third_edge,
        } => {
            write_i32(buf, *mesh_id);
            write_i32(buf, *first_edge);
            write_i32(buf, *second_edge);
            write_i32(buf, *third_edge);
        }
        Call::SetMeshTriangleWithEdges {
            mesh_id,
            first_vertex,
            second_vertex,
            third_vertex,
        } => {
            write_i32(buf, *mesh_id);
            write_i32(buf, *first_vertex);
            write_i32(buf, *second_vertex);
            write_i32(buf, *third_vertex);
        }
        Call::SetMeshQuad {
            mesh_id,
            first_edge,
            second_edge,
            third_edge,
            fourth_edge,
        } => {
            write_i32(buf, *mesh_id);
            write_i32(buf, *first_edge);
            write_i32(buf, *second_edge);
            write_i32(buf, *third_edge);
            write_i32(buf, *fourth_edge);
        }
        Call::SetMeshQuadWithEdges {
            mesh_id,
            first_vertex,
            second_vertex,
            third_vertex,
            fourth_vertex,
        } => {
            write_i32(buf, *mesh_id);
            write_i32(buf, *first_vertex);
            write_i32(buf, *second_vertex);
            write_i32(buf, *third_vertex);
            write_i32(buf, *fourth_vertex);
        }
        Call::WriteScalarData {
            data_id,
            index,
            value,
        } => {
            write_i32(buf, *data_id);
            write_i32(buf, *index);
            write_f64(buf, *value);
        }
        Call::ReadScalarData { data_id, index } | Call::ReadVectorData { data_id, index } => {
            write_i32(buf, *data_id);
            write_i32(buf, *index);
        }
        Call::WriteBlockScalarData {
            data_id,
            indices,
            values,
        }
        | Call::WriteBlockVectorData {
            data_id,
            indices,
            values,
        } => {
            write_i32(buf, *data_id);
            write_i32_array(buf, indices);
            write_f64_array(buf, values);
        }
        Call::ReadBlockScalarData { data_id, indices }
        | Call::ReadBlockVectorData { data_id, indices } => {
            write_i32(buf, *data_id);
            write_i32_array(buf, indices);
        }
        Call::WriteVectorData {
            data_id,
            index,
            value,
        } => {
            write_i32(buf, *data_id);
            write_i32(buf, *index);
            write_f64_array(buf, value);
        }
    }
}

// ── Call payload decoding ─────────────────────────────────────────────────────

fn decode_call_payload(opcode: Opcode, p: &[u8]) -> Result<Call, CodecError> {
    let (call, end) = match opcode {
        Opcode::Ping => (Call::Ping, 0),
        Opcode::Initialize => (Call::Initialize, 0),
        Opcode::InitializeData => (Call::InitializeData, 0),
        Opcode::Finalize => (Call::Finalize, 0),
        Opcode::Advance => {
            let (dt, end) = read_f64(p, 0)?;
            (Call::Advance { dt }, end)
        }
        Opcode::FulfilledAction => {
            let (action, end) = read_string(p, 0)?;
            (Call::FulfilledAction { action }, end)
        }
        Opcode::SetMeshVertex => {
            let (mesh_id, off) = read_i32(p, 0)?;
            let (position, end) = read_f64_array(p, off)?;
            (Call::SetMeshVertex { mesh_id, position }, end)
        }
        Opcode::GetMeshVertexSize => {
            let (mesh_id, end) = read_i32(p, 0)?;
            (Call::GetMeshVertexSize { mesh_id }, end)
        }
        Opcode::ResetMesh => {
            let (mesh_id, end) = read_i32(p, 0)?;
            (Call::ResetMesh { mesh_id }, end)
        }
        Opcode::SetMeshVertices => {
            let (mesh_id, off) = read_i32(p, 0)?;
            let (positions, end) = read_f64_array(p, off)?;
            (Call::SetMeshVertices { mesh_id, positions }, end)
        }
        Opcode::GetMeshVertices => {
            let (mesh_id, off) = read_i32(p, 0)?;
            let (ids, end) = read_i32_array(p, off)?;
            (Call::GetMeshVertices { mesh_id, ids }, end)
        }
        Opcode::GetMeshVertexIdsFromPositions => {
            let (mesh_id, off) = read_i32(p, 0)?;
            let (positions, end) = read_f64_array(p, off)?;
            (Call::GetMeshVertexIdsFromPositions { mesh_id, positions }, end)
        }
        Opcode::SetMeshEdge => {
            let (mesh_id, off) = read_i32(p, 0)?;
            let (first_vertex, off) = read_i32(p, off)?;
            let (second_vertex, end) = read_i32(p, off)?;
            (
                Call::SetMeshEdge {
                    mesh_id,
                    first_vertex,
                    second_vertex,
                },
                end,
            )
        }
        Opcode::SetMeshTriangle => {
            let (mesh_id, off) = read_i32(p, 0)?;
            let (first_edge, off) = read_i32(p, off)?;
            let (second_edge, off) = read_i32(p, off)?;
            let (third_edge, end) = read_i32(p, off)?;
            (
                Call::SetMeshTriangle {
                    mesh_id,
                    first_edge,
                    second_edge,
                    third_edge,
                },
                end,
            )
        }
        Opcode::SetMeshTriangleWithEdges => {
            let (mesh_id, off) = read_i32(p, 0)?;
            let (first_vertex, off) = read_i32(p, off)?;
            let (second_vertex, off) = read_i32(p, off)?;
            let (third_vertex, end) = read_i32(p, off)?;
            (
                Call::SetMeshTriangleWithEdges {
                    mesh_id,
                    first_vertex,
                    second_vertex,
                    third_vertex,
                },
                end,
            )
        }
        Opcode::SetMeshQuad => {
            let (mesh_id, off) = read_i32(p, 0)?;
            let (first_edge, off) = read_i32(p, off)?;
            let (second_edge, off) = read_i32(p, off)?;
            let (third_edge, off) = read_i32(p, off)?;
            let (fourth_edge, end) = read_i32(p, off)?;
            (
                Call::SetMeshQuad {
                    mesh_id,
                    first_edge,
                    second_edge,
                    third_edge,
                    fourth_edge,
                },
                end,
            )
        }
        Opcode::SetMeshQuadWithEdges => {
            let (mesh_id, off) = read_i32(p, 0)?;
            let (first_vertex, off) = read_i32(p, off)?;
            let (second_vertex, off) = read_i32(p, off)?;
            let (third_vertex, off) = read_i32(p, off)?;
            let (fourth_vertex, end) = read_i32(p, off)?;
            (
                Call::SetMeshQuadWithEdges {
                    mesh_id,
                    first_vertex,
                    second_vertex,
                    third_vertex,
                    fourth_vertex,
                },
                end,
            )
        }
        Opcode::WriteScalarData => {
            let (data_id, off) = read_i32(p, 0)?;
            let (index, off) = read_i32(p, off)?;
            let (value, end) = read_f64(p, off)?;
            (
                Call::WriteScalarData {
                    data_id,
                    index,
                    value,
                },
                end,
            )
        }
        Opcode::ReadScalarData => {
            let (data_id, off) = read_i32(p, 0)?;
            let (index, end) = read_i32(p, off)?;
            (Call::ReadScalarData { data_id, index }, end)
        }
        Opcode::WriteBlockScalarData => {
            let (data_id, off) = read_i32(p, 0)?;
            let (indices, off) = read_i32_array(p, off)?;
            let (values, end) = read_f64_array(p, off)?;
            (
                Call::WriteBlockScalarData {
                    data_id,
                    indices,
                    values,
                },
                end,
            )
        }
        Opcode::ReadBlockScalarData => {
            let (data_id, off) = read_i32(p, 0)?;
            let (indices, end) = read_i32_array(p, off)?;
            (Call::ReadBlockScalarData { data_id, indices }, end)
        }
        Opcode::WriteVectorData => {
            let (data_id, off) = read_i32(p, 0)?;
            let (index, off) = read_i32(p, off)?;
            let (value, end) = read_f64_array(p, off)?;
            (
                Call::WriteVectorData {
                    data_id,
                    index,
                    value,
                },
                end,
            )
        }
        Opcode::ReadVectorData => {
            let (data_id, off) = read_i32(p, 0)?;
            let (index, end) = read_i32(p, off)?;
            (Call::ReadVectorData { data_id, index }, end)
        }
        Opcode::WriteBlockVectorData => {
            let (data_id, off) = read_i32(p, 0)?;
            let (indices, off) = read_i32_array(p, off)?;
            let (values, end) = read_f64_array(p, off)?;
            (
                Call::WriteBlockVectorData {
                    data_id,
                    indices,
                    values,
                },
                end,
            )
        }
        Opcode::ReadBlockVectorData => {
            let (data_id, off) = read_i32(p, 0)?;
            let (indices, end) = read_i32_array(p, off)?;
            (Call::ReadBlockVectorData { data_id, indices }, end)
        }
        Opcode::MapWriteDataFrom => {
            let (mesh_id, end) = read_i32(p, 0)?;
            (Call::MapWriteDataFrom { mesh_id }, end)
        }
        Opcode::MapReadDataTo => {
            let (mesh_id, end) = read_i32(p, 0)?;
            (Call::MapReadDataTo { mesh_id }, end)
        }
    };

    ensure_consumed(p, end, opcode.name())?;
    Ok(call)
}

// ── Reply payload encoding / decoding ─────────────────────────────────────────

fn encode_reply_payload(buf: &mut Vec<u8>, reply: &Reply) {
    match reply {
        Reply::Ack => {}
        Reply::Id(id) => write_i32(buf, *id),
        Reply::Size(size) => write_i32(buf, *size),
        Reply::Ids(ids) => write_i32_array(buf, ids),
        Reply::Scalar(value) => write_f64(buf, *value),
        Reply::Values(values) => write_f64_array(buf, values),
        Reply::Failure { code, message } => {
            buf.push(*code as u8);
            write_string(buf, message);
        }
    }
}

fn decode_reply_payload(tag: ReplyTag, p: &[u8]) -> Result<Reply, CodecError> {
    let (reply, end) = match tag {
        ReplyTag::Ack => (Reply::Ack, 0),
        ReplyTag::Id => {
            let (id, end) = read_i32(p, 0)?;
            (Reply::Id(id), end)
        }
        ReplyTag::Size => {
            let (size, end) = read_i32(p, 0)?;
            (Reply::Size(size), end)
        }
        ReplyTag::Ids => {
            let (ids, end) = read_i32_array(p, 0)?;
            (Reply::Ids(ids), end)
        }
        ReplyTag::Scalar => {
            let (value, end) = read_f64(p, 0)?;
            (Reply::Scalar(value), end)
        }
        ReplyTag::Values => {
            let (values, end) = read_f64_array(p, 0)?;
            (Reply::Values(values), end)
        }
        ReplyTag::Failure => {
            let (raw, off) = read_u8(p, 0)?;
            let code = FailureCode::try_from(raw)
                .map_err(|_| CodecError::MalformedPayload(format!("unknown failure code: {raw}")))?;
            let (message, end) = read_string(p, off)?;
            (Reply::Failure { code, message }, end)
        }
    };

    ensure_consumed(p, end, "reply")?;
    Ok(reply)
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn ensure_consumed(p: &[u8], end: usize, context: &str) -> Result<(), CodecError> {
    if end != p.len() {
        return Err(CodecError::MalformedPayload(format!(
            "{context}: {} trailing bytes after payload",
            p.len() - end
        )));
    }
    Ok(())
}

fn read_u8(buf: &[u8], offset: usize) -> Result<(u8, usize), CodecError> {
    if buf.len() < offset + 1 {
        return Err(CodecError::InsufficientData {
            needed: offset + 1,
            available: buf.len(),
        });
    }
    Ok((buf[offset], offset + 1))
}

fn read_i32(buf: &[u8], offset: usize) -> Result<(i32, usize), CodecError> {
    if buf.len() < offset + 4 {
        return Err(CodecError::InsufficientData {
            needed: offset + 4,
            available: buf.len(),
        });
    }
    let v = i32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]);
    Ok((v, offset + 4))
}

fn read_f64(buf: &[u8], offset: usize) -> Result<(f64, usize), CodecError> {
    if buf.len() < offset + 8 {
        return Err(CodecError::InsufficientData {
            needed: offset + 8,
            available: buf.len(),
        });
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[offset..offset + 8]);
    Ok((f64::from_be_bytes(raw), offset + 8))
}

/// Reads an `i32` count prefix and rejects negative values.
fn read_count(buf: &[u8], offset: usize) -> Result<(usize, usize), CodecError> {
    let (count, next) = read_i32(buf, offset)?;
    if count < 0 {
        return Err(CodecError::NegativeCount(count));
    }
    Ok((count as usize, next))
}

fn read_i32_array(buf: &[u8], offset: usize) -> Result<(Vec<i32>, usize), CodecError> {
    let (count, start) = read_count(buf, offset)?;
    let needed = start + count * 4;
    if buf.len() < needed {
        return Err(CodecError::InsufficientData {
            needed,
            available: buf.len(),
        });
    }
    let mut values = Vec::with_capacity(count);
    let mut off = start;
    for _ in 0..count {
        values.push(i32::from_be_bytes([
            buf[off],
            buf[off + 1],
            buf[off + 2],
            buf[off + 3],
        ]));
        off += 4;
    }
    Ok((values, off))
}

fn read_f64_array(buf: &[u8], offset: usize) -> Result<(Vec<f64>, usize), CodecError> {
    let (count, start) = read_count(buf, offset)?;
    let needed = start + count * 8;
    if buf.len() < needed {
        return Err(CodecError::InsufficientData {
            needed,
            available: buf.len(),
        });
    }
    let mut values = Vec::with_capacity(count);
    let mut off = start;
    for _ in 0..count {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[off..off + 8]);
        values.push(f64::from_be_bytes(raw));
        off += 8;
    }
    Ok((values, off))
}

/// Reads an `i32` byte-count prefix and then that many UTF-8 bytes.
/// Returns the string and the offset of the byte after it.
fn read_string(buf: &[u8], offset: usize) -> Result<(String, usize), CodecError> {
    let (len, start) = read_count(buf, offset)?;
    let end = start + len;
    if buf.len() < end {
        return Err(CodecError::InsufficientData {
            needed: end,
            available: buf.len(),
        });
    }
    let s = std::str::from_utf8(&buf[start..end])
        .map_err(|e| CodecError::MalformedPayload(format!("invalid UTF-8 in string: {e}")))?
        .to_string();
    Ok((s, end))
}

fn write_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_i32_array(buf: &mut Vec<u8>, values: &[i32]) {
    write_i32(buf, values.len() as i32);
    for v in values {
        write_i32(buf, *v);
    }
}

fn write_f64_array(buf: &mut Vec<u8>, values: &[f64]) {
    write_i32(buf, values.len() as i32);
    for v in values {
        write_f64(buf, *v);
    }
}

/// Writes an `i32` byte-count prefix followed by the UTF-8 string bytes.
fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_i32(buf, s.len() as i32);
    buf.extend_from_slice(s.as_bytes());
}

// ── Tests ─────────────────────────────────────────────────────────────────────
