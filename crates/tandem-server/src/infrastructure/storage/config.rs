//! TOML-based session configuration for the coupling server.
//!
//! The server reads one file per session (by default `tandem.toml` in the
//! working directory) that names the participants' shared mesh and data
//! registries plus the transport settings:
//!
//! ```toml
//! [server]
//! listen_addr = "127.0.0.1:7200"
//! rank_count = 2
//! collective_timeout_secs = 30
//! dimensions = 3
//!
//! [[mesh]]
//! id = 1
//! name = "Fluid-Mesh"
//!
//! [[data]]
//! id = 1
//! name = "Forces"
//! mesh = 1
//! components = 1
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file, so a missing
//! file or a bare `[server]` section yields a working single-machine setup.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `listen_addr` is not a parseable socket address.
    #[error("listen_addr {value:?} is not a valid socket address: {source}")]
    InvalidListenAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// The file parsed but describes an unusable session.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    /// Meshes registered before the session starts serving calls.
    #[serde(default, rename = "mesh")]
    pub meshes: Vec<MeshEntry>,
    /// Data fields, each bound to one registered mesh.
    #[serde(default, rename = "data")]
    pub data: Vec<DataEntry>,
}

/// Transport and session-shape settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// TCP address the server listens on for solver connections.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Number of solver ranks that must join before the session starts.
    #[serde(default = "default_rank_count")]
    pub rank_count: usize,
    /// Bounded wait for a collective round, in seconds.
    #[serde(default = "default_collective_timeout_secs")]
    pub collective_timeout_secs: u64,
    /// Spatial dimensions of every mesh (2 or 3).
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

/// One mesh the server owns for the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeshEntry {
    /// Handle solvers use on the wire.
    pub id: i32,
    /// Human-readable name; same-named fields on different meshes pair up
    /// for mapping.
    pub name: String,
}

/// One data field bound to a mesh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataEntry {
    /// Handle solvers use on the wire.
    pub id: i32,
    /// Field name; shared across meshes to declare a mapping pair.
    pub name: String,
    /// Id of the mesh this field lives on.
    pub mesh: i32,
    /// Values per vertex: 1 for scalar fields, `dimensions` for vectors.
    #[serde(default = "default_components")]
    pub components: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_listen_addr() -> String {
    "127.0.0.1:7200".to_string()
}
fn default_rank_count() -> usize {
    2
}
fn default_collective_timeout_secs() -> u64 {
    30
}
fn default_dimensions() -> usize {
    3
}
fn default_components() -> usize {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            meshes: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            rank_count: default_rank_count(),
            collective_timeout_secs: default_collective_timeout_secs(),
            dimensions: default_dimensions(),
        }
    }
}

// ── Loading and validation ────────────────────────────────────────────────────

/// Loads the session configuration from `path`, returning
/// `ServerConfig::default()` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: ServerConfig = toml::from_str(&content)?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

impl ServerConfig {
    /// Checks that the parsed file describes a session the server can run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violation, or
    /// [`ConfigError::InvalidListenAddr`] for an unparseable address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.server.rank_count < 1 {
            return Err(ConfigError::Invalid(
                "rank_count must be at least 1".to_string(),
            ));
        }
        if !matches!(self.server.dimensions, 2 | 3) {
            return Err(ConfigError::Invalid(format!(
                "dimensions must be 2 or 3, got {}",
                self.server.dimensions
            )));
        }

        let mut mesh_ids = HashSet::new();
        for mesh in &self.meshes {
            if !mesh_ids.insert(mesh.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate mesh id {}",
                    mesh.id
                )));
            }
        }
        let mut data_ids = HashSet::new();
        for field in &self.data {
            if !data_ids.insert(field.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate data id {}",
                    field.id
                )));
            }
            if !mesh_ids.contains(&field.mesh) {
                return Err(ConfigError::Invalid(format!(
                    "data {} references unknown mesh {}",
                    field.id, field.mesh
                )));
            }
            if field.components < 1 {
                return Err(ConfigError::Invalid(format!(
                    "data {} must have at least one component",
                    field.id
                )));
            }
        }
        Ok(())
    }

    /// The parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen_addr
            .parse()
            .map_err(|source| ConfigError::InvalidListenAddr {
                value: self.server.listen_addr.clone(),
                source,
            })
    }

    /// The collective bounded wait as a [`Duration`].
    pub fn collective_timeout(&self) -> Duration {
        Duration::from_secs(self.server.collective_timeout_secs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
