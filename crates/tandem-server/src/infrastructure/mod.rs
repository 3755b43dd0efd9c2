//! Infrastructure layer for the coupling server.
//!
//! Contains process-facing adapters: the TCP transport that carries solver
//! traffic and the file-system configuration loader.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `tandem_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
