//! Domain entities for the coupling interface.
//!
//! This module contains pure coupling-interface state with no infrastructure
//! dependencies: it compiles and tests on any platform without sockets,
//! runtimes, or configuration files.  The server's façade mutates these
//! types; the protocol layer only forwards the handles that reference them.

/// Interface mesh geometry (vertices, edges, triangles, quads).
///
/// See [`mesh::Mesh`] for the main type.
pub mod mesh;

/// Field value storage addressed by vertex id.
///
/// See [`fields::DataField`] for the main type.
pub mod fields;
