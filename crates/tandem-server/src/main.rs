//! Coupling server entry point.
//!
//! Loads the session configuration, registers the shared mesh and data
//! handles, admits every solver rank over TCP, and runs the session loop
//! until the finalize round completes.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- session shape from tandem.toml
//!  └─ SolverCoupling::new()    -- shared mesh and data registries
//!  └─ TcpChannelListener::bind()
//!       └─ accept_ranks()      -- hello/welcome handshake, dense rank ids
//!  └─ Session::run()           -- dispatch frames until finalize
//! ```

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use tandem_server::application::coupling::SolverCoupling;
use tandem_server::application::dispatcher::Dispatcher;
use tandem_server::application::session::Session;
use tandem_server::infrastructure::network::tcp::TcpChannelListener;
use tandem_server::infrastructure::storage::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tandem.toml"));
    info!(path = %config_path.display(), "loading session configuration");
    let config = load_config(&config_path)?;
    config.validate()?;

    let mut coupling = SolverCoupling::new(config.server.dimensions);
    for mesh in &config.meshes {
        coupling.register_mesh(mesh.id, &mesh.name)?;
    }
    for field in &config.data {
        coupling.register_field(field.id, &field.name, field.mesh, field.components)?;
    }
    info!(
        meshes = config.meshes.len(),
        fields = config.data.len(),
        dimensions = config.server.dimensions,
        "coupling state ready"
    );

    let dispatcher = Dispatcher::new(
        coupling,
        config.server.rank_count,
        config.collective_timeout(),
    );

    let listener = TcpChannelListener::bind(config.listen_addr()?).await?;
    info!(
        addr = %listener.local_addr(),
        ranks = config.server.rank_count,
        "waiting for solver ranks"
    );
    // Joining ranks get the same bounded wait as a collective round.
    let channel = listener
        .accept_ranks(
            config.server.rank_count,
            config.server.dimensions as i32,
            config.collective_timeout(),
        )
        .await?;

    let dispatcher = Session::new(channel, dispatcher).run().await?;
    info!(
        windows = dispatcher.facade().completed_windows(),
        time = dispatcher.facade().coupled_time(),
        "coupling session complete"
    );
    Ok(())
}
