//! The coupling façade trait the dispatcher executes calls against.
//!
//! The dispatcher never touches meshes or fields directly: once a call is
//! decoded and (for collective operations) aggregated, it is executed through
//! [`CouplingFacade`]. The shipped implementation is
//! [`crate::application::coupling::SolverCoupling`]; tests substitute
//! recording fakes.
//!
//! Everything here is synchronous. Blocking semantics live in the pending
//! collective set, not in the façade: by the time a façade method runs, the
//! dispatcher has already decided the operation must execute now.

use tandem_core::{FailureCode, FieldError, MeshError};
use thiserror::Error;

/// Error type for façade execution failures.
///
/// Each variant maps onto exactly one wire-level [`FailureCode`] via
/// [`FacadeError::failure_code`]; the error's `Display` text becomes the
/// failure reply's message.
#[derive(Debug, Error)]
pub enum FacadeError {
    /// No mesh is registered under this handle.
    #[error("unknown mesh handle {0}")]
    UnknownMesh(i32),

    /// No data field is registered under this handle.
    #[error("unknown data handle {0}")]
    UnknownData(i32),

    /// A mesh handle is already taken at registration time.
    #[error("mesh handle {0} is already registered")]
    DuplicateMesh(i32),

    /// A data handle is already taken at registration time.
    #[error("data handle {0} is already registered")]
    DuplicateData(i32),

    /// A geometry operation failed inside the mesh.
    #[error("mesh {mesh}: {source}")]
    Mesh {
        mesh: i32,
        #[source]
        source: MeshError,
    },

    /// A data access failed inside the field.
    #[error("data {data}: {source}")]
    Field {
        data: i32,
        #[source]
        source: FieldError,
    },

    /// The operation is not legal in the coupling's current lifecycle state.
    #[error("{op} requires {requirement}")]
    InvalidState {
        op: &'static str,
        requirement: &'static str,
    },

    /// The resolved time step is not usable.
    #[error("invalid time step {0}; dt must be finite and positive")]
    InvalidTimeStep(f64),

    /// A mapping was requested for a mesh without a mapped counterpart.
    #[error("mesh {0} has no field with a counterpart on another mesh")]
    NoCounterpart(i32),
}

impl FacadeError {
    /// The wire-level failure code this error surfaces as.
    pub fn failure_code(&self) -> FailureCode {
        match self {
            FacadeError::UnknownMesh(_) | FacadeError::UnknownData(_) => {
                FailureCode::UnknownHandle
            }
            FacadeError::Mesh { source, .. } => match source {
                MeshError::UnknownVertex(_) | MeshError::UnknownEdge(_) => {
                    FailureCode::UnknownHandle
                }
                MeshError::InvalidDimensions(_)
                | MeshError::DimensionMismatch { .. }
                | MeshError::PositionNotFound { .. } => FailureCode::InvalidArgument,
            },
            FacadeError::Field { source, .. } => match source {
                // The value index is a vertex handle into the field's mesh.
                FieldError::IndexOutOfRange { .. } => FailureCode::UnknownHandle,
                FieldError::InvalidComponents
                | FieldError::LengthMismatch { .. }
                | FieldError::ComponentMismatch { .. } => FailureCode::InvalidArgument,
            },
            FacadeError::DuplicateMesh(_)
            | FacadeError::DuplicateData(_)
            | FacadeError::InvalidState { .. }
            | FacadeError::InvalidTimeStep(_)
            | FacadeError::NoCounterpart(_) => FailureCode::InvalidArgument,
        }
    }
}

/// The execution surface for every catalogue operation except `ping`.
///
/// One method per wire operation, same argument order as the wire schema.
/// Geometry mutators return the handles they assign; block reads return
/// freshly allocated value vectors (the dispatcher moves them straight into
/// the reply).
pub trait CouplingFacade: Send {
    // ── Lifecycle ─────────────────────────────────────────────────────────

    fn initialize(&mut self) -> Result<(), FacadeError>;
    fn initialize_data(&mut self) -> Result<(), FacadeError>;
    fn advance(&mut self, dt: f64) -> Result<(), FacadeError>;
    fn finalize(&mut self) -> Result<(), FacadeError>;
    fn fulfilled_action(&mut self, action: &str) -> Result<(), FacadeError>;

    // ── Mesh geometry ─────────────────────────────────────────────────────

    fn set_mesh_vertex(&mut self, mesh: i32, position: &[f64]) -> Result<i32, FacadeError>;
    fn get_mesh_vertex_size(&mut self, mesh: i32) -> Result<i32, FacadeError>;
    fn reset_mesh(&mut self, mesh: i32) -> Result<(), FacadeError>;
    fn set_mesh_vertices(&mut self, mesh: i32, positions: &[f64])
        -> Result<Vec<i32>, FacadeError>;
    fn get_mesh_vertices(&mut self, mesh: i32, ids: &[i32]) -> Result<Vec<f64>, FacadeError>;
    fn get_mesh_vertex_ids_from_positions(
        &mut self,
        mesh: i32,
        positions: &[f64],
    ) -> Result<Vec<i32>, FacadeError>;
    fn set_mesh_edge(&mut self, mesh: i32, first: i32, second: i32) -> Result<i32, FacadeError>;
    fn set_mesh_triangle(
        &mut self,
        mesh: i32,
        first: i32,
        second: i32,
        third: i32,
    ) -> Result<(), FacadeError>;
    fn set_mesh_triangle_with_edges(
        &mut self,
        mesh: i32,
        first: i32,
        second: i32,
        third: i32,
    ) -> Result<(), FacadeError>;
    fn set_mesh_quad(
        &mut self,
        mesh: i32,
        first: i32,
        second: i32,
        third: i32,
        fourth: i32,
    ) -> Result<(), FacadeError>;
    fn set_mesh_quad_with_edges(
        &mut self,
        mesh: i32,
        first: i32,
        second: i32,
        third: i32,
        fourth: i32,
    ) -> Result<(), FacadeError>;

    // ── Data access ───────────────────────────────────────────────────────

    fn write_scalar_data(&mut self, data: i32, index: i32, value: f64)
        -> Result<(), FacadeError>;
    fn read_scalar_data(&mut self, data: i32, index: i32) -> Result<f64, FacadeError>;
    fn write_block_scalar_data(
        &mut self,
        data: i32,
        indices: &[i32],
        values: &[f64],
    ) -> Result<(), FacadeError>;
    fn read_block_scalar_data(
        &mut self,
        data: i32,
        indices: &[i32],
    ) -> Result<Vec<f64>, FacadeError>;
    fn write_vector_data(&mut self, data: i32, index: i32, value: &[f64])
        -> Result<(), FacadeError>;
    fn read_vector_data(&mut self, data: i32, index: i32) -> Result<Vec<f64>, FacadeError>;
    fn write_block_vector_data(
        &mut self,
        data: i32,
        indices: &[i32],
        values: &[f64],
    ) -> Result<(), FacadeError>;
    fn read_block_vector_data(
        &mut self,
        data: i32,
        indices: &[i32],
    ) -> Result<Vec<f64>, FacadeError>;

    // ── Mapping ───────────────────────────────────────────────────────────

    fn map_write_data_from(&mut self, mesh: i32) -> Result<(), FacadeError>;
    fn map_read_data_to(&mut self, mesh: i32) -> Result<(), FacadeError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_handles_map_to_unknown_handle_code() {
        assert_eq!(
            FacadeError::UnknownMesh(7).failure_code(),
            FailureCode::UnknownHandle
        );
        assert_eq!(
            FacadeError::UnknownData(7).failure_code(),
            FailureCode::UnknownHandle
        );
        assert_eq!(
            FacadeError::Mesh {
                mesh: 1,
                source: MeshError::UnknownVertex(3),
            }
            .failure_code(),
            FailureCode::UnknownHandle
        );
        assert_eq!(
            FacadeError::Field {
                data: 1,
                source: FieldError::IndexOutOfRange { index: 9, count: 4 },
            }
            .failure_code(),
            FailureCode::UnknownHandle
        );
    }

    #[test]
    fn test_shape_and_state_violations_map_to_invalid_argument() {
        assert_eq!(
            FacadeError::Mesh {
                mesh: 1,
                source: MeshError::DimensionMismatch {
                    expected: 3,
                    got: 4,
                },
            }
            .failure_code(),
            FailureCode::InvalidArgument
        );
        assert_eq!(
            FacadeError::Field {
                data: 1,
                source: FieldError::LengthMismatch {
                    indices: 2,
                    values: 5,
                },
            }
            .failure_code(),
            FailureCode::InvalidArgument
        );
        assert_eq!(
            FacadeError::InvalidState {
                op: "advance",
                requirement: "initialize first",
            }
            .failure_code(),
            FailureCode::InvalidArgument
        );
        assert_eq!(
            FacadeError::InvalidTimeStep(f64::NAN).failure_code(),
            FailureCode::InvalidArgument
        );
    }
}
