//! # tandem-core
//!
//! Shared library for Tandem containing the coupling call catalogue, the
//! binary wire codec, and the interface-mesh domain types.
//!
//! This crate is used by both the coupling server and the solver-side client.
//! It has zero dependencies on sockets, async runtimes, or configuration
//! formats.
//!
//! # Architecture overview (for beginners)
//!
//! Tandem couples independently running numerical solvers (a flow solver and
//! a structure solver, say) that exchange field data on a shared interface
//! mesh.  One process, the **server**, owns the coupling state: the meshes,
//! the data fields, and the coupling clock.  Every solver process (a
//! **client rank**) drives the server remotely, calling operations like
//! `setMeshVertex` or `advance` as if they were local functions.
//!
//! This crate (`tandem-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How calls travel over the network.  Every remote
//!   operation is a [`protocol::call::Call`] value, encoded into a compact
//!   binary frame (8-byte header + payload) and decoded back into a typed
//!   Rust value on the other end.  Replies and the connection handshake use
//!   the same framing.
//!
//! - **`domain`** – Pure coupling-interface state with no I/O: the
//!   [`domain::mesh::Mesh`] geometry a rank registers vertices and
//!   connectivity into, and the [`domain::fields::DataField`] value storage
//!   that read/write data operations address by vertex id.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `tandem_core::Call` instead of `tandem_core::protocol::call::Call`.
pub use domain::fields::{DataField, FieldError};
pub use domain::mesh::{Mesh, MeshError};
pub use protocol::call::{Call, Opcode};
pub use protocol::codec::{decode_call, decode_reply, encode_call, encode_reply, CodecError};
pub use protocol::handshake::{Hello, Welcome};
pub use protocol::reply::{FailureCode, Reply};
pub use protocol::{RankId, HEADER_SIZE, MAX_PAYLOAD, PROTOCOL_VERSION};
