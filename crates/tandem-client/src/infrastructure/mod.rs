//! Infrastructure layer for the solver-side client.
//!
//! Contains the process-facing adapter: TCP network I/O toward the coupling
//! server.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `tandem_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – TCP implementation of the application's `ClientChannel`
//!   trait.  Connects to the server, performs the hello/welcome handshake
//!   that assigns this process its rank, and then moves whole frames in both
//!   directions.

pub mod network;
