//! Call catalogue: every remote operation a solver rank can invoke on the
//! coupling server.
//!
//! Calls come in two execution classes:
//!
//! - **Per-rank** calls run immediately against the sender's mesh/data
//!   handles and produce exactly one reply, to the sender.  Geometry and
//!   data access fall in this class because each rank owns a disjoint mesh
//!   partition and must be free to populate and query it without waiting on
//!   its peers.
//! - **Collective** calls are a barrier: the server holds them until every
//!   rank in the session has issued the same opcode, executes the underlying
//!   coupling operation exactly once, and only then replies to all
//!   participants.  Time control and data mapping fall in this class because
//!   no single rank may move the shared coupling state alone.
//!
//! [`Opcode::is_collective`] is the single source of truth for the split.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Call opcodes carried in the frame header tag byte.
///
/// Values are grouped in ranges by category to leave room for growth.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Control and lifecycle (0x01 - 0x0F)
    Ping = 0x01,
    Initialize = 0x02,
    InitializeData = 0x03,
    Advance = 0x04,
    Finalize = 0x05,
    FulfilledAction = 0x06,

    // Mesh construction and queries (0x10 - 0x1F)
    SetMeshVertex = 0x10,
    GetMeshVertexSize = 0x11,
    ResetMesh = 0x12,
    SetMeshVertices = 0x13,
    GetMeshVertices = 0x14,
    GetMeshVertexIdsFromPositions = 0x15,
    SetMeshEdge = 0x16,
    SetMeshTriangle = 0x17,
    SetMeshTriangleWithEdges = 0x18,
    SetMeshQuad = 0x19,
    SetMeshQuadWithEdges = 0x1A,

    // Field data access (0x40 - 0x4F)
    WriteScalarData = 0x40,
    ReadScalarData = 0x41,
    WriteBlockScalarData = 0x42,
    ReadBlockScalarData = 0x43,
    WriteVectorData = 0x44,
    ReadVectorData = 0x45,
    WriteBlockVectorData = 0x46,
    ReadBlockVectorData = 0x47,

    // Data mapping (0x60 - 0x6F)
    MapWriteDataFrom = 0x60,
    MapReadDataTo = 0x61,
}

impl Opcode {
    /// Returns `true` for opcodes that must be issued by every rank before
    /// the server may execute them (once) and reply (to all).
    pub fn is_collective(&self) -> bool {
        matches!(
            self,
            Opcode::Initialize
                | Opcode::InitializeData
                | Opcode::Advance
                | Opcode::Finalize
                | Opcode::MapWriteDataFrom
                | Opcode::MapReadDataTo
        )
    }

    /// Catalogue name of the operation, used in logs and failure messages.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Ping => "ping",
            Opcode::Initialize => "initialize",
            Opcode::InitializeData => "initializeData",
            Opcode::Advance => "advance",
            Opcode::Finalize => "finalize",
            Opcode::FulfilledAction => "fulfilledAction",
            Opcode::SetMeshVertex => "setMeshVertex",
            Opcode::GetMeshVertexSize => "getMeshVertexSize",
            Opcode::ResetMesh => "resetMesh",
            Opcode::SetMeshVertices => "setMeshVertices",
            Opcode::GetMeshVertices => "getMeshVertices",
            Opcode::GetMeshVertexIdsFromPositions => "getMeshVertexIDsFromPositions",
            Opcode::SetMeshEdge => "setMeshEdge",
            Opcode::SetMeshTriangle => "setMeshTriangle",
            Opcode::SetMeshTriangleWithEdges => "setMeshTriangleWithEdges",
            Opcode::SetMeshQuad => "setMeshQuad",
            Opcode::SetMeshQuadWithEdges => "setMeshQuadWithEdges",
            Opcode::WriteScalarData => "writeScalarData",
            Opcode::ReadScalarData => "readScalarData",
            Opcode::WriteBlockScalarData => "writeBlockScalarData",
            Opcode::ReadBlockScalarData => "readBlockScalarData",
            Opcode::WriteVectorData => "writeVectorData",
            Opcode::ReadVectorData => "readVectorData",
            Opcode::WriteBlockVectorData => "writeBlockVectorData",
            Opcode::ReadBlockVectorData => "readBlockVectorData",
            Opcode::MapWriteDataFrom => "mapWriteDataFrom",
            Opcode::MapReadDataTo => "mapReadDataTo",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Opcode::Ping),
            0x02 => Ok(Opcode::Initialize),
            0x03 => Ok(Opcode::InitializeData),
            0x04 => Ok(Opcode::Advance),
            0x05 => Ok(Opcode::Finalize),
            0x06 => Ok(Opcode::FulfilledAction),
            0x10 => Ok(Opcode::SetMeshVertex),
            0x11 => Ok(Opcode::GetMeshVertexSize),
            0x12 => Ok(Opcode::ResetMesh),
            0x13 => Ok(Opcode::SetMeshVertices),
            0x14 => Ok(Opcode::GetMeshVertices),
            0x15 => Ok(Opcode::GetMeshVertexIdsFromPositions),
            0x16 => Ok(Opcode::SetMeshEdge),
            0x17 => Ok(Opcode::SetMeshTriangle),
            0x18 => Ok(Opcode::SetMeshTriangleWithEdges),
            0x19 => Ok(Opcode::SetMeshQuad),
            0x1A => Ok(Opcode::SetMeshQuadWithEdges),
            0x40 => Ok(Opcode::WriteScalarData),
            0x41 => Ok(Opcode::ReadScalarData),
            0x42 => Ok(Opcode::WriteBlockScalarData),
            0x43 => Ok(Opcode::ReadBlockScalarData),
            0x44 => Ok(Opcode::WriteVectorData),
            0x45 => Ok(Opcode::ReadVectorData),
            0x46 => Ok(Opcode::WriteBlockVectorData),
            0x47 => Ok(Opcode::ReadBlockVectorData),
            0x60 => Ok(Opcode::MapWriteDataFrom),
            0x61 => Ok(Opcode::MapReadDataTo),
            _ => Err(()),
        }
    }
}

/// One remote invocation: an opcode plus its typed arguments.
///
/// Created by a client proxy at call time, consumed exactly once by the
/// server dispatcher, never persisted.  Mesh and data handles are opaque
/// `i32` identifiers assigned by the server; positions and values are flat
/// `f64` arrays in vertex-major order (`n × dimensions` for block geometry
/// and vector data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Call {
    // ── Control and lifecycle ─────────────────────────────────────────────
    /// Liveness probe; answered immediately by the dispatcher itself.
    Ping,
    /// Collective: freeze geometry and set up the coupling state.
    Initialize,
    /// Collective: exchange initial data values once geometry is frozen.
    InitializeData,
    /// Collective: advance the coupling clock by the resolved time step.
    Advance { dt: f64 },
    /// Collective: end the session; the server loop exits after replying.
    Finalize,
    /// Notify the server that the solver completed a required action tag.
    FulfilledAction { action: String },

    // ── Mesh construction and queries ─────────────────────────────────────
    /// Register one vertex; replies with the assigned vertex id.
    SetMeshVertex { mesh_id: i32, position: Vec<f64> },
    /// Number of vertices currently registered in the mesh.
    GetMeshVertexSize { mesh_id: i32 },
    /// Drop all geometry from the mesh, keeping its identity.
    ResetMesh { mesh_id: i32 },
    /// Register `n` vertices from a flat position array; replies with ids.
    SetMeshVertices { mesh_id: i32, positions: Vec<f64> },
    /// Fetch the positions of the given vertex ids.
    GetMeshVertices { mesh_id: i32, ids: Vec<i32> },
    /// Look up vertex ids by exact position match.
    GetMeshVertexIdsFromPositions { mesh_id: i32, positions: Vec<f64> },
    /// Register (or reuse) the undirected edge between two vertices.
    SetMeshEdge {
        mesh_id: i32,
        first_vertex: i32,
        second_vertex: i32,
    },
    /// Register a triangle from three existing edge ids.
    SetMeshTriangle {
        mesh_id: i32,
        first_edge: i32,
        second_edge: i32,
        third_edge: i32,
    },
    /// Register a triangle from three vertex ids, creating missing edges.
    SetMeshTriangleWithEdges {
        mesh_id: i32,
        first_vertex: i32,
        second_vertex: i32,
        third_vertex: i32,
    },
    /// Register a quad from four existing edge ids.
    SetMeshQuad {
        mesh_id: i32,
        first_edge: i32,
        second_edge: i32,
        third_edge: i32,
        fourth_edge: i32,
    },
    /// Register a quad from four vertex ids, creating missing edges.
    SetMeshQuadWithEdges {
        mesh_id: i32,
        first_vertex: i32,
        second_vertex: i32,
        third_vertex: i32,
        fourth_vertex: i32,
    },

    // ── Field data access ─────────────────────────────────────────────────
    WriteScalarData {
        data_id: i32,
        index: i32,
        value: f64,
    },
    ReadScalarData {
        data_id: i32,
        index: i32,
    },
    WriteBlockScalarData {
        data_id: i32,
        indices: Vec<i32>,
        values: Vec<f64>,
    },
    ReadBlockScalarData {
        data_id: i32,
        indices: Vec<i32>,
    },
    WriteVectorData {
        data_id: i32,
        index: i32,
        value: Vec<f64>,
    },
    ReadVectorData {
        data_id: i32,
        index: i32,
    },
    WriteBlockVectorData {
        data_id: i32,
        indices: Vec<i32>,
        values: Vec<f64>,
    },
    ReadBlockVectorData {
        data_id: i32,
        indices: Vec<i32>,
    },

    // ── Data mapping ──────────────────────────────────────────────────────
    /// Collective: map all written fields from this mesh to its counterpart.
    MapWriteDataFrom { mesh_id: i32 },
    /// Collective: map all read fields onto this mesh from its counterpart.
    MapReadDataTo { mesh_id: i32 },
}

impl Call {
    /// Returns the opcode for this call (used as the frame tag).
    pub fn opcode(&self) -> Opcode {
        match self {
            Call::Ping => Opcode::Ping,
            Call::Initialize => Opcode::Initialize,
            Call::InitializeData => Opcode::InitializeData,
            Call::Advance { .. } => Opcode::Advance,
            Call::Finalize => Opcode::Finalize,
            Call::FulfilledAction { .. } => Opcode::FulfilledAction,
            Call::SetMeshVertex { .. } => Opcode::SetMeshVertex,
            Call::GetMeshVertexSize { .. } => Opcode::GetMeshVertexSize,
            Call::ResetMesh { .. } => Opcode::ResetMesh,
            Call::SetMeshVertices { .. } => Opcode::SetMeshVertices,
            Call::GetMeshVertices { .. } => Opcode::GetMeshVertices,
            Call::GetMeshVertexIdsFromPositions { .. } => Opcode::GetMeshVertexIdsFromPositions,
            Call::SetMeshEdge { .. } => Opcode::SetMeshEdge,
            Call::SetMeshTriangle { .. } => Opcode::SetMeshTriangle,
            Call::SetMeshTriangleWithEdges { .. } => Opcode::SetMeshTriangleWithEdges,
            Call::SetMeshQuad { .. } => Opcode::SetMeshQuad,
            Call::SetMeshQuadWithEdges { .. } => Opcode::SetMeshQuadWithEdges,
            Call::WriteScalarData { .. } => Opcode::WriteScalarData,
            Call::ReadScalarData { .. } => Opcode::ReadScalarData,
            Call::WriteBlockScalarData { .. } => Opcode::WriteBlockScalarData,
            Call::ReadBlockScalarData { .. } => Opcode::ReadBlockScalarData,
            Call::WriteVectorData { .. } => Opcode::WriteVectorData,
            Call::ReadVectorData { .. } => Opcode::ReadVectorData,
            Call::WriteBlockVectorData { .. } => Opcode::WriteBlockVectorData,
            Call::ReadBlockVectorData { .. } => Opcode::ReadBlockVectorData,
            Call::MapWriteDataFrom { .. } => Opcode::MapWriteDataFrom,
            Call::MapReadDataTo { .. } => Opcode::MapReadDataTo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collective_opcodes_are_exactly_the_barrier_set() {
        let collective = [
            Opcode::Initialize,
            Opcode::InitializeData,
            Opcode::Advance,
            Opcode::Finalize,
            Opcode::MapWriteDataFrom,
            Opcode::MapReadDataTo,
        ];
        for op in collective {
            assert!(op.is_collective(), "{op} should be collective");
        }
        for op in [
            Opcode::Ping,
            Opcode::FulfilledAction,
            Opcode::SetMeshVertex,
            Opcode::GetMeshVertexSize,
            Opcode::ResetMesh,
            Opcode::SetMeshEdge,
            Opcode::WriteBlockVectorData,
            Opcode::ReadScalarData,
        ] {
            assert!(!op.is_collective(), "{op} should be per-rank");
        }
    }

    #[test]
    fn test_opcode_byte_round_trip() {
        let all = [
            Opcode::Ping,
            Opcode::Initialize,
            Opcode::InitializeData,
            Opcode::Advance,
            Opcode::Finalize,
            Opcode::FulfilledAction,
            Opcode::SetMeshVertex,
            Opcode::GetMeshVertexSize,
            Opcode::ResetMesh,
            Opcode::SetMeshVertices,
            Opcode::GetMeshVertices,
            Opcode::GetMeshVertexIdsFromPositions,
            Opcode::SetMeshEdge,
            Opcode::SetMeshTriangle,
            Opcode::SetMeshTriangleWithEdges,
            Opcode::SetMeshQuad,
            Opcode::SetMeshQuadWithEdges,
            Opcode::WriteScalarData,
            Opcode::ReadScalarData,
            Opcode::WriteBlockScalarData,
            Opcode::ReadBlockScalarData,
            Opcode::WriteVectorData,
            Opcode::ReadVectorData,
            Opcode::WriteBlockVectorData,
            Opcode::ReadBlockVectorData,
            Opcode::MapWriteDataFrom,
            Opcode::MapReadDataTo,
        ];
        for op in all {
            assert_eq!(Opcode::try_from(op as u8), Ok(op));
        }
    }

    #[test]
    fn test_unknown_opcode_byte_is_rejected() {
        assert_eq!(Opcode::try_from(0x00), Err(()));
        assert_eq!(Opcode::try_from(0x0F), Err(()));
        assert_eq!(Opcode::try_from(0xFF), Err(()));
    }

    #[test]
    fn test_call_reports_its_opcode() {
        assert_eq!(Call::Ping.opcode(), Opcode::Ping);
        assert_eq!(Call::Advance { dt: 0.1 }.opcode(), Opcode::Advance);
        assert_eq!(
            Call::SetMeshVertex {
                mesh_id: 1,
                position: vec![0.0, 0.0, 0.0]
            }
            .opcode(),
            Opcode::SetMeshVertex
        );
        assert_eq!(
            Call::MapReadDataTo { mesh_id: 2 }.opcode(),
            Opcode::MapReadDataTo
        );
    }
}
