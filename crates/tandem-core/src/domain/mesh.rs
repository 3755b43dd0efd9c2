//! Interface mesh domain entity.
//!
//! A [`Mesh`] holds the geometry one coupling interface is defined on:
//! vertices with fixed-dimensional positions, undirected edges between
//! vertices, and triangles/quads built from edges.  Handles are dense `i32`
//! ids assigned in registration order, because they travel over the wire and
//! index flat value arrays on both sides.

use thiserror::Error;

/// Errors that can occur when mutating or querying a mesh.
#[derive(Debug, Error, PartialEq)]
pub enum MeshError {
    /// The mesh was constructed with dimensions other than 2 or 3.
    #[error("mesh dimensions must be 2 or 3, got {0}")]
    InvalidDimensions(usize),

    /// Position data whose length is not a multiple of the mesh dimensions.
    #[error("position data of {got} doubles does not fit a {expected}-dimensional mesh")]
    DimensionMismatch { expected: usize, got: usize },

    /// The vertex id is not registered in this mesh.
    #[error("unknown vertex id {0}")]
    UnknownVertex(i32),

    /// The edge id is not registered in this mesh.
    #[error("unknown edge id {0}")]
    UnknownEdge(i32),

    /// A position lookup found no vertex at the queried coordinates.
    /// `index` is the zero-based position index within the query.
    #[error("no vertex registered at query position {index}")]
    PositionNotFound { index: usize },
}

/// Interface mesh geometry for one registered mesh handle.
///
/// Positions are stored as one flat `f64` array in vertex-major order, the
/// same layout the wire protocol uses, so block registration and block
/// lookup are plain slice copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    dimensions: usize,
    positions: Vec<f64>,
    edges: Vec<(i32, i32)>,
    triangles: Vec<[i32; 3]>,
    quads: Vec<[i32; 4]>,
}

impl Mesh {
    /// Creates an empty mesh embedded in `dimensions`-dimensional space.
    pub fn new(dimensions: usize) -> Result<Self, MeshError> {
        if !(2..=3).contains(&dimensions) {
            return Err(MeshError::InvalidDimensions(dimensions));
        }
        Ok(Self {
            dimensions,
            positions: Vec::new(),
            edges: Vec::new(),
            triangles: Vec::new(),
            quads: Vec::new(),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of registered vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / self.dimensions
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn quad_count(&self) -> usize {
        self.quads.len()
    }

    /// Registers one vertex and returns its assigned id.
    pub fn add_vertex(&mut self, position: &[f64]) -> Result<i32, MeshError> {
        if position.len() != self.dimensions {
            return Err(MeshError::DimensionMismatch {
                expected: self.dimensions,
                got: position.len(),
            });
        }
        let id = self.vertex_count() as i32;
        self.positions.extend_from_slice(position);
        Ok(id)
    }

    /// Registers `n` vertices from a flat `n × dimensions` position array and
    /// returns their assigned ids in input order.
    pub fn add_vertices(&mut self, positions: &[f64]) -> Result<Vec<i32>, MeshError> {
        if positions.len() % self.dimensions != 0 {
            return Err(MeshError::DimensionMismatch {
                expected: self.dimensions,
                got: positions.len(),
            });
        }
        let first = self.vertex_count() as i32;
        let count = (positions.len() / self.dimensions) as i32;
        self.positions.extend_from_slice(positions);
        Ok((first..first + count).collect())
    }

    /// Position of one vertex.
    pub fn position(&self, vertex: i32) -> Result<&[f64], MeshError> {
        let index = self.vertex_index(vertex)?;
        let start = index * self.dimensions;
        Ok(&self.positions[start..start + self.dimensions])
    }

    /// Positions of the given vertices as one flat array in query order.
    pub fn positions_of(&self, vertices: &[i32]) -> Result<Vec<f64>, MeshError> {
        let mut out = Vec::with_capacity(vertices.len() * self.dimensions);
        for vertex in vertices {
            out.extend_from_slice(self.position(*vertex)?);
        }
        Ok(out)
    }

    /// Resolves vertex ids from a flat array of query positions.
    ///
    /// Matching is exact on the stored `f64` representation: the inverse of
    /// registering the same coordinate values, not a proximity search.
    pub fn vertex_ids_at(&self, positions: &[f64]) -> Result<Vec<i32>, MeshError> {
        if positions.len() % self.dimensions != 0 {
            return Err(MeshError::DimensionMismatch {
                expected: self.dimensions,
                got: positions.len(),
            });
        }
        let mut ids = Vec::with_capacity(positions.len() / self.dimensions);
        for (index, query) in positions.chunks_exact(self.dimensions).enumerate() {
            let found = self
                .positions
                .chunks_exact(self.dimensions)
                .position(|candidate| candidate == query)
                .ok_or(MeshError::PositionNotFound { index })?;
            ids.push(found as i32);
        }
        Ok(ids)
    }

    /// Registers the undirected edge between two vertices and returns its id.
    ///
    /// Registering the same vertex pair again (in either order) returns the
    /// existing edge id instead of creating a duplicate, so connectivity
    /// built incrementally by a solver stays free of twin edges.
    pub fn add_edge(&mut self, first: i32, second: i32) -> Result<i32, MeshError> {
        self.vertex_index(first)?;
        self.vertex_index(second)?;
        if let Some(existing) = self.edge_between(first, second) {
            return Ok(existing);
        }
        let id = self.edges.len() as i32;
        self.edges.push((first, second));
        Ok(id)
    }

    /// Returns the id of the undirected edge between two vertices, if any.
    pub fn edge_between(&self, first: i32, second: i32) -> Option<i32> {
        self.edges
            .iter()
            .position(|&(a, b)| (a, b) == (first, second) || (a, b) == (second, first))
            .map(|index| index as i32)
    }

    /// Registers a triangle from three existing edge ids.
    pub fn add_triangle(&mut self, edges: [i32; 3]) -> Result<(), MeshError> {
        for edge in edges {
            self.check_edge(edge)?;
        }
        self.triangles.push(edges);
        Ok(())
    }

    /// Registers a triangle from three vertex ids, creating (or reusing) the
    /// connecting edges.
    pub fn add_triangle_from_vertices(&mut self, vertices: [i32; 3]) -> Result<(), MeshError> {
        let [a, b, c] = vertices;
        let ab = self.add_edge(a, b)?;
        let bc = self.add_edge(b, c)?;
        let ca = self.add_edge(c, a)?;
        self.triangles.push([ab, bc, ca]);
        Ok(())
    }

    /// Registers a quad from four existing edge ids.
    pub fn add_quad(&mut self, edges: [i32; 4]) -> Result<(), MeshError> {
        for edge in edges {
            self.check_edge(edge)?;
        }
        self.quads.push(edges);
        Ok(())
    }

    /// Registers a quad from four vertex ids in ring order, creating (or
    /// reusing) the connecting edges.
    pub fn add_quad_from_vertices(&mut self, vertices: [i32; 4]) -> Result<(), MeshError> {
        let [a, b, c, d] = vertices;
        let ab = self.add_edge(a, b)?;
        let bc = self.add_edge(b, c)?;
        let cd = self.add_edge(c, d)?;
        let da = self.add_edge(d, a)?;
        self.quads.push([ab, bc, cd, da]);
        Ok(())
    }

    /// Drops all geometry while keeping the mesh identity and dimensions,
    /// so a solver with moving geometry can re-register its interface.
    pub fn reset(&mut self) {
        self.positions.clear();
        self.edges.clear();
        self.triangles.clear();
        self.quads.clear();
    }

    /// All vertex positions as one flat array.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    fn vertex_index(&self, vertex: i32) -> Result<usize, MeshError> {
        if vertex < 0 || vertex as usize >= self.vertex_count() {
            return Err(MeshError::UnknownVertex(vertex));
        }
        Ok(vertex as usize)
    }

    fn check_edge(&self, edge: i32) -> Result<(), MeshError> {
        if edge < 0 || edge as usize >= self.edges.len() {
            return Err(MeshError::UnknownEdge(edge));
        }
        Ok(())
    }
}
