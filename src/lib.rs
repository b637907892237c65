#![feature(portable_simd)]

//! Exact closest-point queries on triangle meshes.
//!
//! Builds an acceleration structure once, then answers "closest point on the
//! mesh to `q`" in O(1) expected work per query, independent of mesh size.
//! A 4-way SIMD BVH finds the nearest mesh vertex; a precomputed per-vertex
//! *interception list* (derived from the generalized Voronoi diagram of the
//! mesh's vertices, edges and faces) names the only edges and faces that
//! could beat that vertex, and a SIMD closest-feature scan settles it.
//!
//! The returned primitive is the true closest feature (vertex, edge
//! interior, or triangle interior), not just an approximate hit.
//!
//! # Example
//!
//! ```
//! use mesh_proximity::{AccelerationStructure, PrimitiveKind};
//!
//! let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
//! let triangles = [[0u32, 1, 2]];
//!
//! let accel = AccelerationStructure::build(&positions, &triangles, 4.0)
//!     .expect("build should succeed");
//!
//! let hit = accel.closest_point([0.25, 0.25, 1.0]);
//! assert_eq!(hit.kind, PrimitiveKind::Face);
//! assert!((hit.distance_squared - 1.0).abs() < 1e-6);
//! ```
//!
//! Queries are exact for points inside the cube `[-2L, 2L]^3`, where `L` is
//! the `limit_cube_len` passed to [`AccelerationStructure::build`]; pick `L`
//! to cover the query domain. The structure is immutable after build and
//! safe to query from many threads at once.

macro_rules! maybe_par_into_iter {
    ($v:expr) => {{
        #[cfg(feature = "parallel")]
        {
            $v.into_par_iter()
        }
        #[cfg(not(feature = "parallel"))]
        {
            $v.into_iter()
        }
    }};
}

mod bvh;
mod cell_builder;
mod convex_cell;
mod error;
mod interception;
mod mesh;
mod query;
mod simd;
mod types;
pub mod validation;

pub use error::BuildError;
pub use types::{ClosestPoint, PrimitiveKind};

use std::sync::OnceLock;

use glam::DVec3;

pub(crate) fn log_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("MESH_PROXIMITY_LOG")
            .ok()
            .map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"))
    })
}

/// A built closest-point acceleration structure.
///
/// Owns the deduplicated mesh plus everything derived from it: the edge and
/// face clipping planes, the vertex BVH and the packed per-vertex
/// interception lists. Read-only after construction.
pub struct AccelerationStructure {
    pub(crate) points: Vec<DVec3>,
    pub(crate) triangles: Vec<[u32; 3]>,
    pub(crate) geometry: mesh::MeshGeometry,
    pub(crate) bvh: bvh::Bvh,
    pub(crate) interception: interception::InterceptionLists,
}

impl AccelerationStructure {
    /// Build from vertex positions and triangle index triples.
    ///
    /// Bit-identical duplicate vertices are merged and triangle indices
    /// remapped to the surviving representative before anything else; the
    /// accessors expose the post-merge mesh. `limit_cube_len` bounds the
    /// region of exact queries (see the crate docs).
    pub fn build(
        positions: &[[f32; 3]],
        triangles: &[[u32; 3]],
        limit_cube_len: f32,
    ) -> Result<Self, BuildError> {
        if !limit_cube_len.is_finite() || limit_cube_len <= 0.0 {
            return Err(BuildError::InvalidInput(format!(
                "limit_cube_len must be positive and finite, got {}",
                limit_cube_len
            )));
        }
        for (i, p) in positions.iter().enumerate() {
            if !p.iter().all(|c| c.is_finite()) {
                return Err(BuildError::InvalidInput(format!(
                    "non-finite coordinate in vertex {}",
                    i
                )));
            }
        }
        for (f, tri) in triangles.iter().enumerate() {
            for &idx in tri {
                if idx as usize >= positions.len() {
                    return Err(BuildError::InvalidInput(format!(
                        "triangle {} references vertex {} of {}",
                        f,
                        idx,
                        positions.len()
                    )));
                }
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
                return Err(BuildError::InvalidInput(format!(
                    "triangle {} has repeated vertex indices",
                    f
                )));
            }
        }

        let mut points: Vec<DVec3> = positions
            .iter()
            .map(|p| DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64))
            .collect();
        let mut tris: Vec<[u32; 3]> = triangles.to_vec();

        // Voronoi cells are bounded by the cube [-2L, 2L]^3; a vertex
        // outside it would get an empty cell.
        let half = 2.0 * limit_cube_len as f64;
        for (i, p) in points.iter().enumerate() {
            if p.abs().max_element() > half {
                return Err(BuildError::InvalidInput(format!(
                    "vertex {} lies outside the limit cube of half-length {}",
                    i, half
                )));
            }
        }

        let removed = mesh::merge_duplicate_points(&mut points, &mut tris);
        if removed > 0 && log_enabled() {
            eprintln!(
                "mesh-proximity: merged {} duplicate vertices ({} -> {})",
                removed,
                positions.len(),
                points.len()
            );
        }

        let geometry = mesh::MeshGeometry::new(&points, &tris)?;

        // Packed lanes encode vertex/edge/face indices in one i32 space.
        let total = points.len() + geometry.edges.len() + geometry.faces.len();
        if total >= i32::MAX as usize {
            return Err(BuildError::InvalidInput(format!(
                "mesh too large: {} combined primitives",
                total
            )));
        }

        let bvh = bvh::Bvh::new(&points);

        let cells = cell_builder::build_vertex_cells(&points, &bvh, limit_cube_len as f64);
        if let Some(v) = cells.cells.iter().position(|c| c.is_empty()) {
            return Err(BuildError::CellConstruction(format!(
                "empty Voronoi cell for vertex {}",
                v
            )));
        }

        let interception =
            interception::compute_interception_lists(&points, &tris, &geometry, &cells);

        Ok(Self {
            points,
            triangles: tris,
            geometry,
            bvh,
            interception,
        })
    }

    /// Build from flat coordinate and index arrays (`3 * N` floats,
    /// `3 * M` indices).
    pub fn from_flat(
        positions: &[f32],
        indices: &[u32],
        limit_cube_len: f32,
    ) -> Result<Self, BuildError> {
        if positions.len() % 3 != 0 {
            return Err(BuildError::InvalidInput(format!(
                "flat position array length {} is not a multiple of 3",
                positions.len()
            )));
        }
        if indices.len() % 3 != 0 {
            return Err(BuildError::InvalidInput(format!(
                "flat index array length {} is not a multiple of 3",
                indices.len()
            )));
        }
        let pos: Vec<[f32; 3]> = positions
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        let tris: Vec<[u32; 3]> = indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Self::build(&pos, &tris, limit_cube_len)
    }

    /// Closest point on the mesh to `q`.
    ///
    /// Total for any finite `q`. On a structure built from an empty mesh
    /// this returns the sentinel `{ distance_squared: +inf,
    /// primitive_index: 0, kind: Vertex, closest_point: [0, 0, 0] }`.
    #[inline]
    pub fn closest_point(&self, q: [f32; 3]) -> ClosestPoint {
        query::calc_closest_point(self, q)
    }

    /// Number of mesh vertices after duplicate merging.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.points.len()
    }

    /// Number of unique undirected edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.geometry.edges.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.geometry.faces.len()
    }

    /// Copy of the built (post-merge) vertex positions.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.points
            .iter()
            .map(|p| [p.x as f32, p.y as f32, p.z as f32])
            .collect()
    }

    /// Copy of the triangle index triples, remapped to the built vertices.
    pub fn faces(&self) -> Vec<[u32; 3]> {
        self.triangles.clone()
    }

    /// Endpoint pair `(start, end)` of every edge, with `start < end`.
    pub fn edge_vertices(&self) -> Vec<(u32, u32)> {
        self.geometry.edges.iter().map(|e| (e.start, e.end)).collect()
    }

    /// Endpoint pair of one edge.
    pub fn edge(&self, index: usize) -> (u32, u32) {
        let e = &self.geometry.edges[index];
        (e.start, e.end)
    }

    /// Per face, the global edge indices of its three edges in cyclic order
    /// `(e01, e12, e20)`.
    pub fn face_edges(&self) -> Vec<[u32; 3]> {
        self.triangles
            .iter()
            .map(|tri| {
                let mut out = [0u32; 3];
                for i in 0..3 {
                    let key = mesh::edge_key(tri[i], tri[(i + 1) % 3]);
                    out[i] = self.geometry.edge_index[&key];
                }
                out
            })
            .collect()
    }
}
