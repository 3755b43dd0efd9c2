//! Demonstration solver rank for the tandem coupling server.
//!
//! Connects to a running server, registers a small patch of interface
//! vertices, and drives a fixed number of coupling windows, writing a scalar
//! field before each `advance` and reading it back after.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ TcpClientChannel::connect()   -- hello/welcome handshake, rank assigned
//!  └─ CouplingProxy::new()
//!       ├─ setMeshVertices          -- this rank's slice of the interface
//!       ├─ initialize               -- collective barrier across all ranks
//!       ├─ per window: writeBlockScalarData → advance → readBlockScalarData
//!       └─ finalize                 -- collective barrier, ends the session
//! ```
//!
//! Run one process per rank; the server admits them in connection order and
//! blocks collective calls until every rank has arrived.
//!
//! Usage: `tandem-client [server-addr] [solver-name] [windows]`

use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tandem_client::application::solver::CouplingProxy;
use tandem_client::infrastructure::network::TcpClientChannel;

/// Mesh and data ids matching the server's default `tandem.toml`.
const MESH_ID: i32 = 1;
const DATA_ID: i32 = 1;

const TIME_STEP: f64 = 0.01;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let addr: SocketAddr = args
        .next()
        .unwrap_or_else(|| "127.0.0.1:7200".to_string())
        .parse()
        .context("server address must be host:port")?;
    let solver = args.next().unwrap_or_else(|| "dummy-solver".to_string());
    let windows: u32 = args
        .next()
        .unwrap_or_else(|| "5".to_string())
        .parse()
        .context("window count must be an integer")?;

    info!(%addr, solver = %solver, windows, "tandem demo solver starting");

    let channel = TcpClientChannel::connect(addr, &solver).await?;
    let rank = channel.rank();
    let dimensions = channel.dimensions() as usize;
    let mut proxy = CouplingProxy::new(channel);

    proxy.ping().await?;

    // Each rank contributes two vertices, offset along x so the ranks'
    // slices of the shared mesh stay disjoint.
    let offset = rank as f64 * 2.0;
    let mut positions = vec![0.0; 2 * dimensions];
    positions[0] = offset;
    positions[dimensions] = offset + 1.0;
    let ids = proxy.set_mesh_vertices(MESH_ID, &positions).await?;
    info!(rank, ?ids, "registered interface vertices");

    proxy.initialize().await?;

    let mut values = vec![0.0; ids.len()];
    for window in 0..windows {
        for (i, value) in values.iter_mut().enumerate() {
            *value = (rank as f64 + 1.0) * 100.0 + window as f64 + i as f64 / 10.0;
        }
        proxy
            .write_block_scalar_data(DATA_ID, &ids, &values)
            .await?;

        proxy.advance(TIME_STEP).await?;

        let mut read_back = vec![0.0; ids.len()];
        proxy
            .read_block_scalar_data(DATA_ID, &ids, &mut read_back)
            .await?;
        info!(rank, window, ?read_back, "window complete");
    }

    proxy.finalize().await?;
    info!(rank, "coupling finished");

    Ok(())
}
