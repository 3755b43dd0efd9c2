//! Network infrastructure for the coupling server.
//!
//! # Sub-modules
//!
//! - **`tcp`** – Accepts one TCP connection per solver rank, runs the
//!   hello/welcome handshake that assigns dense rank ids, and multiplexes
//!   every connection into the single inbound event stream the session
//!   loop consumes.

pub mod tcp;
