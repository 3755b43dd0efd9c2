//! The shipped coupling façade: registries, lifecycle, and mapping.
//!
//! [`SolverCoupling`] owns every mesh and data field of one coupling session.
//! Ranks share all registries: the server keeps one geometry, one value
//! array per field, and one lifecycle state for the whole session.
//!
//! Lifecycle: `Constructed → Initialized → Finalized`. `initialize` freezes
//! the session's field sizes against the then-registered geometry; `advance`
//! re-syncs them so solvers that reset and re-register a moving interface
//! keep working; `finalize` is terminal.

use std::collections::BTreeMap;

use tandem_core::{DataField, Mesh};
use tracing::{debug, info};

use crate::application::facade::{CouplingFacade, FacadeError};

#[derive(Debug)]
struct MeshEntry {
    name: String,
    mesh: Mesh,
}

#[derive(Debug)]
struct FieldEntry {
    name: String,
    mesh: i32,
    field: DataField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Constructed,
    Initialized,
    Finalized,
}

/// Which way a mapping moves values between a mesh and its counterpart.
#[derive(Debug, Clone, Copy)]
enum MapDirection {
    /// Values written on the named mesh are pushed to the counterpart.
    WriteFrom,
    /// Values on the counterpart are pulled onto the named mesh.
    ReadTo,
}

/// The coupling session state behind the façade.
///
/// Registries use `BTreeMap` so iteration (and with it the mapping pairing)
/// is deterministic across runs.
#[derive(Debug)]
pub struct SolverCoupling {
    dimensions: usize,
    meshes: BTreeMap<i32, MeshEntry>,
    fields: BTreeMap<i32, FieldEntry>,
    state: Lifecycle,
    coupled_time: f64,
    completed_windows: u64,
    fulfilled: Vec<String>,
}

impl SolverCoupling {
    /// Creates an empty coupling session in `dimensions`-dimensional space.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            meshes: BTreeMap::new(),
            fields: BTreeMap::new(),
            state: Lifecycle::Constructed,
            coupled_time: 0.0,
            completed_windows: 0,
            fulfilled: Vec::new(),
        }
    }

    /// Registers a mesh handle before the session starts serving calls.
    pub fn register_mesh(&mut self, id: i32, name: &str) -> Result<(), FacadeError> {
        if self.meshes.contains_key(&id) {
            return Err(FacadeError::DuplicateMesh(id));
        }
        let mesh = Mesh::new(self.dimensions).map_err(mesh_err(id))?;
        self.meshes.insert(
            id,
            MeshEntry {
                name: name.to_string(),
                mesh,
            },
        );
        debug!(mesh = id, name, "registered mesh");
        Ok(())
    }

    /// Registers a data field on an already registered mesh.
    pub fn register_field(
        &mut self,
        id: i32,
        name: &str,
        mesh: i32,
        components: usize,
    ) -> Result<(), FacadeError> {
        if self.fields.contains_key(&id) {
            return Err(FacadeError::DuplicateData(id));
        }
        if !self.meshes.contains_key(&mesh) {
            return Err(FacadeError::UnknownMesh(mesh));
        }
        let field = DataField::new(components).map_err(field_err(id))?;
        self.fields.insert(
            id,
            FieldEntry {
                name: name.to_string(),
                mesh,
                field,
            },
        );
        debug!(data = id, name, mesh, components, "registered data field");
        Ok(())
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Total coupled time accumulated by `advance`.
    pub fn coupled_time(&self) -> f64 {
        self.coupled_time
    }

    /// Number of completed time windows.
    pub fn completed_windows(&self) -> u64 {
        self.completed_windows
    }

    /// Action tags recorded via `fulfilledAction`, in arrival order.
    pub fn fulfilled_actions(&self) -> &[String] {
        &self.fulfilled
    }

    // ── Internal helpers ──────────────────────────────────────────────────

    fn ensure_active(&self, op: &'static str) -> Result<(), FacadeError> {
        if self.state == Lifecycle::Finalized {
            return Err(FacadeError::InvalidState {
                op,
                requirement: "a session that has not been finalized",
            });
        }
        Ok(())
    }

    fn ensure_initialized(&self, op: &'static str) -> Result<(), FacadeError> {
        self.ensure_active(op)?;
        if self.state != Lifecycle::Initialized {
            return Err(FacadeError::InvalidState {
                op,
                requirement: "initialize to run first",
            });
        }
        Ok(())
    }

    fn mesh_ref(&self, mesh: i32) -> Result<&Mesh, FacadeError> {
        self.meshes
            .get(&mesh)
            .map(|entry| &entry.mesh)
            .ok_or(FacadeError::UnknownMesh(mesh))
    }

    fn mesh_mut(&mut self, mesh: i32) -> Result<&mut Mesh, FacadeError> {
        self.meshes
            .get_mut(&mesh)
            .map(|entry| &mut entry.mesh)
            .ok_or(FacadeError::UnknownMesh(mesh))
    }

    fn field_ref(&self, data: i32) -> Result<&FieldEntry, FacadeError> {
        self.fields.get(&data).ok_or(FacadeError::UnknownData(data))
    }

    fn field_mut(&mut self, data: i32) -> Result<&mut DataField, FacadeError> {
        self.fields
            .get_mut(&data)
            .map(|entry| &mut entry.field)
            .ok_or(FacadeError::UnknownData(data))
    }

    /// Resizes every field to its mesh's current vertex count.
    fn sync_field_sizes(&mut self) {
        for entry in self.fields.values_mut() {
            let count = self
                .meshes
                .get(&entry.mesh)
                .map(|m| m.mesh.vertex_count())
                .unwrap_or(0);
            entry.field.resize_for(count);
        }
    }

    /// Runs the nearest-neighbour transfer for every field on `mesh` that has
    /// a same-named counterpart on another mesh.
    fn run_mapping(&mut self, mesh: i32, direction: MapDirection) -> Result<(), FacadeError> {
        if !self.meshes.contains_key(&mesh) {
            return Err(FacadeError::UnknownMesh(mesh));
        }
        self.sync_field_sizes();

        let mut pairs = Vec::new();
        for (&fid, entry) in &self.fields {
            if entry.mesh != mesh {
                continue;
            }
            let counterpart = self
                .fields
                .iter()
                .find(|(&cid, ce)| cid != fid && ce.mesh != mesh && ce.name == entry.name)
                .map(|(&cid, _)| cid);
            if let Some(cid) = counterpart {
                pairs.push((fid, cid));
            }
        }
        if pairs.is_empty() {
            return Err(FacadeError::NoCounterpart(mesh));
        }

        for (fid, cid) in pairs {
            let (source, target) = match direction {
                MapDirection::WriteFrom => (fid, cid),
                MapDirection::ReadTo => (cid, fid),
            };
            self.transfer_nearest(source, target)?;
            debug!(source, target, "mapped field values");
        }
        Ok(())
    }

    /// Copies every target vertex's entry from its nearest source vertex.
    fn transfer_nearest(&mut self, source: i32, target: i32) -> Result<(), FacadeError> {
        let (mapped, components) = {
            let source_entry = self.field_ref(source)?;
            let target_entry = self.field_ref(target)?;
            let components = source_entry.field.components();
            if components != target_entry.field.components() {
                return Err(FacadeError::Field {
                    data: target,
                    source: tandem_core::FieldError::ComponentMismatch {
                        field: target_entry.field.components(),
                        supplied: components,
                    },
                });
            }
            let source_mesh = self.mesh_ref(source_entry.mesh)?;
            let target_mesh = self.mesh_ref(target_entry.mesh)?;
            if target_mesh.vertex_count() == 0 {
                return Ok(());
            }
            if source_mesh.vertex_count() == 0 {
                return Err(FacadeError::InvalidState {
                    op: "mapping",
                    requirement: "a non-empty source mesh",
                });
            }

            let values = source_entry.field.values();
            let mut mapped = Vec::with_capacity(target_mesh.vertex_count() * components);
            for nearest in nearest_source_indices(source_mesh, target_mesh) {
                let from = nearest * components;
                mapped.extend_from_slice(&values[from..from + components]);
            }
            (mapped, components)
        };

        let indices: Vec<i32> = (0..(mapped.len() / components) as i32).collect();
        self.field_mut(target)?
            .write_block_vector(&indices, &mapped)
            .map_err(field_err(target))
    }
}

/// For each target vertex, the index of its nearest source vertex by squared
/// Euclidean distance (ties keep the lower index).
fn nearest_source_indices(source: &Mesh, target: &Mesh) -> Vec<usize> {
    let dims = source.dimensions();
    let source_positions = source.positions();
    target
        .positions()
        .chunks_exact(dims)
        .map(|wanted| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (index, candidate) in source_positions.chunks_exact(dims).enumerate() {
                let distance: f64 = candidate
                    .iter()
                    .zip(wanted)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                if distance < best_distance {
                    best_distance = distance;
                    best = index;
                }
            }
            best
        })
        .collect()
}

fn mesh_err(mesh: i32) -> impl FnOnce(tandem_core::MeshError) -> FacadeError {
    move |source| FacadeError::Mesh { mesh, source }
}

fn field_err(data: i32) -> impl FnOnce(tandem_core::FieldError) -> FacadeError {
    move |source| FacadeError::Field { data, source }
}

impl CouplingFacade for SolverCoupling {
    // ── Lifecycle ─────────────────────────────────────────────────────────

    fn initialize(&mut self) -> Result<(), FacadeError> {
        self.ensure_active("initialize")?;
        if self.state == Lifecycle::Initialized {
            return Err(FacadeError::InvalidState {
                op: "initialize",
                requirement: "an uninitialized session",
            });
        }
        self.sync_field_sizes();
        self.state = Lifecycle::Initialized;
        info!(
            meshes = self.meshes.len(),
            fields = self.fields.len(),
            "coupling initialized"
        );
        Ok(())
    }

    fn initialize_data(&mut self) -> Result<(), FacadeError> {
        self.ensure_initialized("initializeData")?;
        self.sync_field_sizes();
        debug!("initial data exchanged");
        Ok(())
    }

    fn advance(&mut self, dt: f64) -> Result<(), FacadeError> {
        self.ensure_initialized("advance")?;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(FacadeError::InvalidTimeStep(dt));
        }
        self.sync_field_sizes();
        self.coupled_time += dt;
        self.completed_windows += 1;
        debug!(
            dt,
            time = self.coupled_time,
            window = self.completed_windows,
            "advanced coupling"
        );
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), FacadeError> {
        self.ensure_active("finalize")?;
        self.state = Lifecycle::Finalized;
        info!(
            windows = self.completed_windows,
            time = self.coupled_time,
            "coupling finalized"
        );
        Ok(())
    }

    fn fulfilled_action(&mut self, action: &str) -> Result<(), FacadeError> {
        self.ensure_active("fulfilledAction")?;
        debug!(action, "solver action fulfilled");
        self.fulfilled.push(action.to_string());
        Ok(())
    }

    // ── Mesh geometry ─────────────────────────────────────────────────────

    fn set_mesh_vertex(&mut self, mesh: i32, position: &[f64]) -> Result<i32, FacadeError> {
        self.ensure_active("setMeshVertex")?;
        self.mesh_mut(mesh)?
            .add_vertex(position)
            .map_err(mesh_err(mesh))
    }

    fn get_mesh_vertex_size(&mut self, mesh: i32) -> Result<i32, FacadeError> {
        self.ensure_active("getMeshVertexSize")?;
        Ok(self.mesh_ref(mesh)?.vertex_count() as i32)
    }

    fn reset_mesh(&mut self, mesh: i32) -> Result<(), FacadeError> {
        self.ensure_active("resetMesh")?;
        self.mesh_mut(mesh)?.reset();
        debug!(mesh, "mesh reset");
        Ok(())
    }

    fn set_mesh_vertices(
        &mut self,
        mesh: i32,
        positions: &[f64],
    ) -> Result<Vec<i32>, FacadeError> {
        self.ensure_active("setMeshVertices")?;
        self.mesh_mut(mesh)?
            .add_vertices(positions)
            .map_err(mesh_err(mesh))
    }

    fn get_mesh_vertices(&mut self, mesh: i32, ids: &[i32]) -> Result<Vec<f64>, FacadeError> {
        self.ensure_active("getMeshVertices")?;
        self.mesh_ref(mesh)?
            .positions_of(ids)
            .map_err(mesh_err(mesh))
    }

    fn get_mesh_vertex_ids_from_positions(
        &mut self,
        mesh: i32,
        positions: &[f64],
    ) -> Result<Vec<i32>, FacadeError> {
        self.ensure_active("getMeshVertexIDsFromPositions")?;
        self.mesh_ref(mesh)?
            .vertex_ids_at(positions)
            .map_err(mesh_err(mesh))
    }

    fn set_mesh_edge(&mut self, mesh: i32, first: i32, second: i32) -> Result<i32, FacadeError> {
        self.ensure_active("setMeshEdge")?;
        self.mesh_mut(mesh)?
            .add_edge(first, second)
            .map_err(mesh_err(mesh))
    }

    fn set_mesh_triangle(
        &mut self,
        mesh: i32,
        first: i32,
        second: i32,
        third: i32,
    ) -> Result<(), FacadeError> {
        self.ensure_active("setMeshTriangle")?;
        self.mesh_mut(mesh)?
            .add_triangle([first, second, third])
            .map_err(mesh_err(mesh))
    }

    fn set_mesh_triangle_with_edges(
        &mut self,
        mesh: i32,
        first: i32,
        second: i32,
        third: i32,
    ) -> Result<(), FacadeError> {
        self.ensure_active("setMeshTriangleWithEdges")?;
        self.mesh_mut(mesh)?
            .add_triangle_from_vertices([first, second, third])
            .map_err(mesh_err(mesh))
    }

    fn set_mesh_quad(
        &mut self,
        mesh: i32,
        first: i32,
        second: i32,
        third: i32,
        fourth: i32,
    ) -> Result<(), FacadeError> {
        self.ensure_active("setMeshQuad")?;
        self.mesh_mut(mesh)?
            .add_quad([first, second, third, fourth])
            .map_err(mesh_err(mesh))
    }

    fn set_mesh_quad_with_edges(
        &mut self,
        mesh: i32,
        first: i32,
        second: i32,
        third: i32,
        fourth: i32,
    ) -> Result<(), FacadeError> {
        self.ensure_active("setMeshQuadWithEdges")?;
        self.mesh_mut(mesh)?
            .add_quad_from_vertices([first, second, third, fourth])
            .map_err(mesh_err(mesh))
    }

    // ── Data access ───────────────────────────────────────────────────────

    fn write_scalar_data(
        &mut self,
        data: i32,
        index: i32,
        value: f64,
    ) -> Result<(), FacadeError> {
        self.ensure_active("writeScalarData")?;
        self.field_mut(data)?
            .write_scalar(index, value)
            .map_err(field_err(data))
    }

    fn read_scalar_data(&mut self, data: i32, index: i32) -> Result<f64, FacadeError> {
        self.ensure_active("readScalarData")?;
        self.field_ref(data)?
            .field
            .read_scalar(index)
            .map_err(field_err(data))
    }

    fn write_block_scalar_data(
        &mut self,
        data: i32,
        indices: &[i32],
        values: &[f64],
    ) -> Result<(), FacadeError> {
        self.ensure_active("writeBlockScalarData")?;
        self.field_mut(data)?
            .write_block_scalar(indices, values)
            .map_err(field_err(data))
    }

    fn read_block_scalar_data(
        &mut self,
        data: i32,
        indices: &[i32],
    ) -> Result<Vec<f64>, FacadeError> {
        self.ensure_active("readBlockScalarData")?;
        self.field_ref(data)?
            .field
            .read_block_scalar(indices)
            .map_err(field_err(data))
    }

    fn write_vector_data(
        &mut self,
        data: i32,
        index: i32,
        value: &[f64],
    ) -> Result<(), FacadeError> {
        self.ensure_active("writeVectorData")?;
        self.field_mut(data)?
            .write_vector(index, value)
            .map_err(field_err(data))
    }

    fn read_vector_data(&mut self, data: i32, index: i32) -> Result<Vec<f64>, FacadeError> {
        self.ensure_active("readVectorData")?;
        self.field_ref(data)?
            .field
            .read_vector(index)
            .map(|values| values.to_vec())
            .map_err(field_err(data))
    }

    fn write_block_vector_data(
        &mut self,
        data: i32,
        indices: &[i32],
        values: &[f64],
    ) -> Result<(), FacadeError> {
        self.ensure_active("writeBlockVectorData")?;
        self.field_mut(data)?
            .write_block_vector(indices, values)
            .map_err(field_err(data))
    }

    fn read_block_vector_data(
        &mut self,
        data: i32,
        indices: &[i32],
    ) -> Result<Vec<f64>, FacadeError> {
        self.ensure_active("readBlockVectorData")?;
        self.field_ref(data)?
            .field
            .read_block_vector(indices)
            .map_err(field_err(data))
    }

    // ── Mapping ───────────────────────────────────────────────────────────

    fn map_write_data_from(&mut self, mesh: i32) -> Result<(), FacadeError> {
        self.ensure_initialized("mapWriteDataFrom")?;
        self.run_mapping(mesh, MapDirection::WriteFrom)
    }

    fn map_read_data_to(&mut self, mesh: i32) -> Result<(), FacadeError> {
        self.ensure_initialized("mapReadDataTo")?;
        self.run_mapping(mesh, MapDirection::ReadTo)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Two 2D meshes coupled through a shared scalar field name.
    fn two_mesh_coupling() -> SolverCoupling {
        let mut coupling = SolverCoupling::new(2);
        coupling.register_mesh(1, "Fluid-Mesh").unwrap();
        coupling.register_mesh(2, "Solid-Mesh").unwrap();
        coupling.register_field(1, "Forces", 1, 1).unwrap();
        coupling.register_field(2, "Forces", 2, 1).unwrap();
        coupling
    }

    #[test]
    fn test_register_mesh_rejects_duplicate_handle() {
        let mut coupling = SolverCoupling::new(2);
        coupling.register_mesh(1, "A").unwrap();
        assert!(matches!(
            coupling.register_mesh(1, "B"),
            Err(FacadeError::DuplicateMesh(1))
        ));
    }

    #[test]
    fn test_register_field_requires_known_mesh() {
        let mut coupling = SolverCoupling::new(2);
        assert!(matches!(
            coupling.register_field(1, "Forces", 9, 1),
            Err(FacadeError::UnknownMesh(9))
        ));
    }

    #[test]
    fn test_vertex_registration_assigns_dense_ids() {
        let mut coupling = two_mesh_coupling();
        assert_eq!(coupling.set_mesh_vertex(1, &[0.0, 0.0]).unwrap(), 0);
        assert_eq!(coupling.set_mesh_vertex(1, &[1.0, 0.0]).unwrap(), 1);
        assert_eq!(coupling.get_mesh_vertex_size(1).unwrap(), 2);
        // The other mesh keeps its own id space.
        assert_eq!(coupling.set_mesh_vertex(2, &[0.5, 0.0]).unwrap(), 0);
    }

    #[test]
    fn test_unknown_mesh_handle_is_rejected() {
        let mut coupling = two_mesh_coupling();
        assert!(matches!(
            coupling.set_mesh_vertex(42, &[0.0, 0.0]),
            Err(FacadeError::UnknownMesh(42))
        ));
    }

    #[test]
    fn test_initialize_sizes_fields_to_geometry() {
        let mut coupling = two_mesh_coupling();
        coupling
            .set_mesh_vertices(1, &[0.0, 0.0, 1.0, 0.0, 2.0, 0.0])
            .unwrap();
        coupling.initialize().unwrap();

        coupling.write_scalar_data(1, 2, 7.5).unwrap();
        assert_eq!(coupling.read_scalar_data(1, 2).unwrap(), 7.5);
        // Out of range stays out of range.
        assert!(coupling.write_scalar_data(1, 3, 0.0).is_err());
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let mut coupling = two_mesh_coupling();
        coupling.initialize().unwrap();
        assert!(matches!(
            coupling.initialize(),
            Err(FacadeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_initialize_data_requires_initialize() {
        let mut coupling = two_mesh_coupling();
        assert!(matches!(
            coupling.initialize_data(),
            Err(FacadeError::InvalidState { .. })
        ));
        coupling.initialize().unwrap();
        assert!(coupling.initialize_data().is_ok());
    }

    #[test]
    fn test_advance_requires_initialize() {
        let mut coupling = two_mesh_coupling();
        assert!(matches!(
            coupling.advance(0.1),
            Err(FacadeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_advance_rejects_non_positive_and_non_finite_dt() {
        let mut coupling = two_mesh_coupling();
        coupling.initialize().unwrap();
        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(coupling.advance(dt), Err(FacadeError::InvalidTimeStep(_))),
                "dt = {dt} must be rejected"
            );
        }
    }

    #[test]
    fn test_advance_accumulates_time_and_windows() {
        let mut coupling = two_mesh_coupling();
        coupling.initialize().unwrap();
        coupling.advance(0.25).unwrap();
        coupling.advance(0.25).unwrap();
        assert_eq!(coupling.coupled_time(), 0.5);
        assert_eq!(coupling.completed_windows(), 2);
    }

    #[test]
    fn test_finalize_is_terminal_for_every_operation() {
        let mut coupling = two_mesh_coupling();
        coupling.initialize().unwrap();
        coupling.finalize().unwrap();

        assert!(matches!(
            coupling.advance(0.1),
            Err(FacadeError::InvalidState { .. })
        ));
        assert!(matches!(
            coupling.get_mesh_vertex_size(1),
            Err(FacadeError::InvalidState { .. })
        ));
        assert!(matches!(
            coupling.finalize(),
            Err(FacadeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_fulfilled_action_records_tags_in_order() {
        let mut coupling = two_mesh_coupling();
        coupling.fulfilled_action("write-initial-data").unwrap();
        coupling.fulfilled_action("write-iteration-checkpoint").unwrap();
        assert_eq!(
            coupling.fulfilled_actions(),
            ["write-initial-data", "write-iteration-checkpoint"]
        );
    }

    #[test]
    fn test_edge_between_same_vertices_is_reused() {
        let mut coupling = two_mesh_coupling();
        coupling
            .set_mesh_vertices(1, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0])
            .unwrap();
        let first = coupling.set_mesh_edge(1, 0, 1).unwrap();
        let reversed = coupling.set_mesh_edge(1, 1, 0).unwrap();
        assert_eq!(first, reversed);
    }

    #[test]
    fn test_triangle_with_edges_creates_connectivity() {
        let mut coupling = two_mesh_coupling();
        coupling
            .set_mesh_vertices(1, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0])
            .unwrap();
        coupling.set_mesh_triangle_with_edges(1, 0, 1, 2).unwrap();
        // The three edges now exist and can be reused by handle.
        coupling.set_mesh_triangle(1, 0, 1, 2).unwrap();
    }

    #[test]
    fn test_reset_mesh_clears_geometry_and_restarts_ids() {
        let mut coupling = two_mesh_coupling();
        coupling.set_mesh_vertex(1, &[0.0, 0.0]).unwrap();
        coupling.reset_mesh(1).unwrap();
        assert_eq!(coupling.get_mesh_vertex_size(1).unwrap(), 0);
        assert_eq!(coupling.set_mesh_vertex(1, &[5.0, 5.0]).unwrap(), 0);
    }

    #[test]
    fn test_vertex_lookup_round_trip() {
        let mut coupling = two_mesh_coupling();
        let positions = [0.0, 0.0, 1.5, 0.25];
        let ids = coupling.set_mesh_vertices(1, &positions).unwrap();
        assert_eq!(
            coupling.get_mesh_vertices(1, &ids).unwrap(),
            positions.to_vec()
        );
        assert_eq!(
            coupling
                .get_mesh_vertex_ids_from_positions(1, &positions)
                .unwrap(),
            ids
        );
    }

    #[test]
    fn test_block_data_round_trip_after_initialize() {
        let mut coupling = two_mesh_coupling();
        let ids = coupling
            .set_mesh_vertices(1, &[0.0, 0.0, 1.0, 0.0])
            .unwrap();
        coupling.initialize().unwrap();

        coupling
            .write_block_scalar_data(1, &ids, &[10.0, 20.0])
            .unwrap();
        assert_eq!(
            coupling.read_block_scalar_data(1, &ids).unwrap(),
            vec![10.0, 20.0]
        );
    }

    #[test]
    fn test_vector_write_rejects_component_mismatch() {
        let mut coupling = SolverCoupling::new(2);
        coupling.register_mesh(1, "M").unwrap();
        coupling.register_field(1, "Velocities", 1, 2).unwrap();
        coupling.set_mesh_vertex(1, &[0.0, 0.0]).unwrap();
        coupling.initialize().unwrap();

        assert!(coupling.write_vector_data(1, 0, &[1.0, 2.0]).is_ok());
        assert!(matches!(
            coupling.write_vector_data(1, 0, &[1.0, 2.0, 3.0]),
            Err(FacadeError::Field { .. })
        ));
    }

    // ── Mapping ───────────────────────────────────────────────────────────

    /// Seeds the standard mapping fixture: three source vertices on a line,
    /// two target vertices near the first and last of them.
    fn seeded_mapping_coupling() -> SolverCoupling {
        let mut coupling = two_mesh_coupling();
        coupling
            .set_mesh_vertices(1, &[0.0, 0.0, 0.9, 0.0, 2.0, 0.0])
            .unwrap();
        coupling
            .set_mesh_vertices(2, &[0.1, 0.0, 1.9, 0.0])
            .unwrap();
        coupling.initialize().unwrap();
        coupling
    }

    #[test]
    fn test_map_write_data_from_pushes_nearest_values() {
        let mut coupling = seeded_mapping_coupling();
        coupling
            .write_block_scalar_data(1, &[0, 1, 2], &[10.0, 20.0, 30.0])
            .unwrap();

        coupling.map_write_data_from(1).unwrap();

        // Target vertex 0 at x=0.1 is nearest source x=0.0; target 1 at
        // x=1.9 is nearest source x=2.0.
        assert_eq!(
            coupling.read_block_scalar_data(2, &[0, 1]).unwrap(),
            vec![10.0, 30.0]
        );
    }

    #[test]
    fn test_map_read_data_to_pulls_counterpart_values() {
        let mut coupling = seeded_mapping_coupling();
        coupling
            .write_block_scalar_data(2, &[0, 1], &[5.0, 7.0])
            .unwrap();

        coupling.map_read_data_to(1).unwrap();

        // Source x = 0.0 and 0.9 sit nearest counterpart x=0.1; x=2.0 is
        // nearest counterpart x=1.9.
        assert_eq!(
            coupling.read_block_scalar_data(1, &[0, 1, 2]).unwrap(),
            vec![5.0, 5.0, 7.0]
        );
    }

    #[test]
    fn test_mapping_requires_initialize() {
        let mut coupling = two_mesh_coupling();
        assert!(matches!(
            coupling.map_write_data_from(1),
            Err(FacadeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_mapping_without_counterpart_is_rejected() {
        let mut coupling = SolverCoupling::new(2);
        coupling.register_mesh(1, "M").unwrap();
        coupling.register_field(1, "Lonely", 1, 1).unwrap();
        coupling.set_mesh_vertex(1, &[0.0, 0.0]).unwrap();
        coupling.initialize().unwrap();

        assert!(matches!(
            coupling.map_write_data_from(1),
            Err(FacadeError::NoCounterpart(1))
        ));
    }

    #[test]
    fn test_mapping_from_empty_source_mesh_is_rejected() {
        let mut coupling = two_mesh_coupling();
        // Mesh 1 stays empty; mesh 2 has a vertex wanting values.
        coupling.set_mesh_vertex(2, &[0.0, 0.0]).unwrap();
        coupling.initialize().unwrap();

        assert!(matches!(
            coupling.map_write_data_from(1),
            Err(FacadeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_mapping_vector_field_moves_whole_entries() {
        let mut coupling = SolverCoupling::new(2);
        coupling.register_mesh(1, "A").unwrap();
        coupling.register_mesh(2, "B").unwrap();
        coupling.register_field(1, "Displacements", 1, 2).unwrap();
        coupling.register_field(2, "Displacements", 2, 2).unwrap();
        coupling.set_mesh_vertices(1, &[0.0, 0.0, 4.0, 0.0]).unwrap();
        coupling.set_mesh_vertex(2, &[3.9, 0.0]).unwrap();
        coupling.initialize().unwrap();

        coupling
            .write_block_vector_data(1, &[0, 1], &[1.0, 2.0, 3.0, 4.0])
            .unwrap();
        coupling.map_write_data_from(1).unwrap();

        assert_eq!(coupling.read_vector_data(2, 0).unwrap(), vec![3.0, 4.0]);
    }
}
