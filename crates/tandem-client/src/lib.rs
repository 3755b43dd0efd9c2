//! tandem-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does tandem-client do? (for beginners)
//!
//! A *solver rank* is one process of a numerical simulation that takes part
//! in a coupled run. Instead of computing the coupling itself, it delegates
//! to the tandem server and drives the session through a typed proxy:
//!
//! 1. Connects to the server over TCP and completes the hello/welcome
//!    handshake, learning its rank id, the total rank count, and the
//!    session's spatial dimensions.
//! 2. Registers its interface geometry (`setMeshVertex`, `setMeshVertices`,
//!    connectivity) on the server's shared meshes.
//! 3. Calls `initialize`, then alternates writing data, `advance`, and
//!    reading data once per time window.
//! 4. Calls `finalize` to end the session.
//!
//! Every call blocks on exactly one reply frame; collective calls
//! (`initialize`, `advance`, `finalize`, data mapping) return only after
//! every other rank has issued the same call.

/// Application layer: the coupling proxy and its channel seam.
pub mod application;

/// Infrastructure layer: the TCP channel implementation.
pub mod infrastructure;
