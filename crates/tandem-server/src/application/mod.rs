//! Application layer of the coupling server.
//!
//! # How a call travels through this layer (for beginners)
//!
//! ```text
//! rank 0 ──frame──▶ Session ──bytes──▶ Dispatcher ──classify──▶ per-rank?
//! rank 1 ──frame──▶   │                    │                      │ execute on
//!                     │                    ▼                      ▼ the façade
//!                     │             CollectiveTracker ──round complete──▶ façade
//!                     ◀──────────── replies (one per participant) ───────┘
//! ```
//!
//! The [`session::Session`] drives the async loop; everything below it is
//! synchronous and transport-free, which is what makes the aggregation
//! invariant ("a collective operation executes exactly once per round")
//! testable without sockets.
//!
//! # Sub-modules
//!
//! - **`facade`** – The [`facade::CouplingFacade`] trait: the narrow surface
//!   the dispatcher executes decoded calls against, plus its error type.
//!
//! - **`coupling`** – [`coupling::SolverCoupling`], the shipped façade:
//!   mesh/field registries, lifecycle state, and nearest-neighbour mapping.
//!
//! - **`collective`** – [`collective::CollectiveTracker`], the pending
//!   collective set. Tracks which ranks have joined each round and when a
//!   round completes or times out.
//!
//! - **`dispatcher`** – [`dispatcher::Dispatcher`], the per-frame state
//!   machine: decode, classify, execute, and fan replies out.
//!
//! - **`session`** – [`session::Session`], the async server loop driver, and
//!   the [`session::ServerChannel`] trait it consumes.

pub mod collective;
pub mod coupling;
pub mod dispatcher;
pub mod facade;
pub mod session;
