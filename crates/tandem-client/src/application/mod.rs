//! Application layer for the solver-side client.
//!
//! - **`solver`** – The [`CouplingProxy`](solver::CouplingProxy): one typed
//!   async method per protocol operation, plus the
//!   [`ClientChannel`](solver::ClientChannel) seam the transport implements.

pub mod solver;
