//! File-system storage for the coupling server.
//!
//! # Sub-modules
//!
//! - **`config`** – Loads and validates the TOML session configuration
//!   (listen address, rank count, mesh and data registries).

pub mod config;
