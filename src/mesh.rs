//! Mesh-derived geometry: deduplication, edges, faces and clipping planes.
//!
//! All build-phase geometry is double precision; plane coefficients are
//! `DVec4` with unit normals so plane evaluation yields signed distance.

use std::collections::BTreeMap;

use glam::{DVec3, DVec4};
use rustc_hash::FxHashMap;

use crate::error::BuildError;
use crate::log_enabled;

/// Axis-aligned box grown point by point. Starts inverted (empty).
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundingBox {
    pub lower: DVec3,
    pub upper: DVec3,
}

impl Default for BoundingBox {
    #[inline]
    fn default() -> Self {
        Self {
            lower: DVec3::splat(f64::MAX),
            upper: DVec3::splat(-f64::MAX),
        }
    }
}

impl BoundingBox {
    #[inline]
    pub fn extend(&mut self, pt: DVec3) {
        self.lower = self.lower.min(pt);
        self.upper = self.upper.max(pt);
    }

    #[inline]
    pub fn extend_box(&mut self, other: &BoundingBox) {
        self.extend(other.lower);
        self.extend(other.upper);
    }
}

#[inline]
pub(crate) fn plane(n: DVec3, w: f64) -> DVec4 {
    DVec4::new(n.x, n.y, n.z, w)
}

#[inline]
pub(crate) fn eval_plane(p: DVec4, pt: DVec3) -> f64 {
    p.x * pt.x + p.y * pt.y + p.z * pt.z + p.w
}

#[inline]
pub(crate) fn plane_normal(p: DVec4) -> DVec3 {
    DVec3::new(p.x, p.y, p.z)
}

/// Squared distance from `p` to the infinite line through `a` and `b`.
#[inline]
pub(crate) fn distance_to_line_squared(p: DVec3, a: DVec3, b: DVec3) -> f64 {
    let ab = b - a;
    let ap = p - a;
    let projected = a + ab * (ap.dot(ab) / ab.dot(ab));
    p.distance_squared(projected)
}

/// Squared distance from `p` to a plane with unit normal.
#[inline]
pub(crate) fn distance_to_plane_squared(p: DVec3, pl: DVec4) -> f64 {
    let d = eval_plane(pl, p);
    d * d
}

#[inline]
pub(crate) fn project_line(p: DVec3, a: DVec3, b: DVec3) -> DVec3 {
    let ab = b - a;
    let ap = p - a;
    a + ab * (ap.dot(ab) / ab.dot(ab))
}

#[inline]
pub(crate) fn project_plane(p: DVec3, pl: DVec4, pt_on_plane: DVec3) -> DVec3 {
    let n = plane_normal(pl);
    p - n.dot(p - pt_on_plane) * n
}

/// An undirected mesh edge `(start, end)` with `start < end`.
///
/// Carries up to four clipping planes bounding its feature region: two
/// endpoint caps and, per incident face, the negation of that face's inward
/// plane for this edge. Boundary edges end up with 3 planes, interior
/// manifold edges with 4.
#[derive(Debug, Clone)]
pub(crate) struct EdgeData {
    pub start: u32,
    pub end: u32,
    pub clipping_planes: [DVec4; 4],
    pub num_planes: usize,
}

impl EdgeData {
    fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            clipping_planes: [DVec4::ZERO; 4],
            num_planes: 0,
        }
    }

    #[inline]
    pub fn planes(&self) -> &[DVec4] {
        &self.clipping_planes[..self.num_planes]
    }
}

/// Per-triangle planes: the face plane plus three inward edge planes.
///
/// Clipping plane `i` contains the edge opposite corner `i`, with its normal
/// in the face plane pointing into the triangle.
#[derive(Debug, Clone)]
pub(crate) struct FaceData {
    pub face_plane: DVec4,
    pub clipping_planes: [DVec4; 3],
    pub pt_on_plane: DVec3,
}

#[inline]
pub(crate) fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Merge bit-identical duplicate vertices and remap triangle indices to the
/// surviving representative. Returns the number of removed vertices.
pub(crate) fn merge_duplicate_points(
    points: &mut Vec<DVec3>,
    triangles: &mut [[u32; 3]],
) -> usize {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_unstable_by(|&a, &b| {
        let (pa, pb) = (points[a], points[b]);
        pa.x.total_cmp(&pb.x)
            .then(pa.y.total_cmp(&pb.y))
            .then(pa.z.total_cmp(&pb.z))
    });

    let mut unique = Vec::with_capacity(points.len());
    let mut index_map = vec![0u32; points.len()];
    for (i, &src) in order.iter().enumerate() {
        if i == 0 || points[src] != points[order[i - 1]] {
            unique.push(points[src]);
        }
        index_map[src] = (unique.len() - 1) as u32;
    }

    let removed = points.len() - unique.len();
    if removed == 0 {
        return 0;
    }

    *points = unique;
    for tri in triangles.iter_mut() {
        for idx in tri.iter_mut() {
            *idx = index_map[*idx as usize];
        }
    }
    removed
}

#[derive(Debug)]
pub(crate) struct MeshGeometry {
    pub edges: Vec<EdgeData>,
    pub faces: Vec<FaceData>,
    pub edge_index: FxHashMap<(u32, u32), u32>,
}

impl MeshGeometry {
    pub fn new(points: &[DVec3], triangles: &[[u32; 3]]) -> Result<Self, BuildError> {
        // Ordered map keeps edge indices independent of triangle order.
        let mut edge_map: BTreeMap<(u32, u32), EdgeData> = BTreeMap::new();

        for (f, tri) in triangles.iter().enumerate() {
            for i in 0..3 {
                let (v0, v1) = edge_key(tri[i], tri[(i + 1) % 3]);
                if v0 == v1 {
                    return Err(BuildError::DegenerateGeometry {
                        face: f,
                        message: format!(
                            "zero-length edge at vertex {} after duplicate merge",
                            v0
                        ),
                    });
                }
                edge_map.entry((v0, v1)).or_insert_with(|| {
                    let start_pt = points[v0 as usize];
                    let end_pt = points[v1 as usize];
                    let n1 = (end_pt - start_pt).normalize();
                    let n2 = -n1;
                    let mut edge = EdgeData::new(v0, v1);
                    edge.clipping_planes[0] = plane(n1, -n1.dot(start_pt));
                    edge.clipping_planes[1] = plane(n2, -n2.dot(end_pt));
                    edge.num_planes = 2;
                    edge
                });
            }
        }

        let mut faces = Vec::with_capacity(triangles.len());
        let mut capped_planes = 0usize;
        for (f, tri) in triangles.iter().enumerate() {
            let [v0, v1, v2] = *tri;
            let p0 = points[v0 as usize];
            let p1 = points[v1 as usize];
            let p2 = points[v2 as usize];

            let n = (p1 - p0).cross(p2 - p0).try_normalize().ok_or_else(|| {
                BuildError::DegenerateGeometry {
                    face: f,
                    message: "face normal does not normalize".to_string(),
                }
            })?;

            // Inward edge planes, one per edge opposite each corner.
            let n0 = (p2 - p1).cross(n).normalize();
            let n1 = (p0 - p2).cross(n).normalize();
            let n2 = (p1 - p0).cross(n).normalize();

            let plane0 = plane(-n0, n0.dot(p1));
            let plane1 = plane(-n1, n1.dot(p2));
            let plane2 = plane(-n2, n2.dot(p0));

            faces.push(FaceData {
                face_plane: plane(n, -n.dot(p0)),
                clipping_planes: [plane0, plane1, plane2],
                pt_on_plane: p0,
            });

            // Each edge also collects the negated inward plane of every
            // incident face, capped at 4 planes total.
            for (a, b, pl) in [
                (v0, v1, plane2),
                (v1, v2, plane0),
                (v2, v0, plane1),
            ] {
                let edge = edge_map.get_mut(&edge_key(a, b)).expect("edge exists");
                if edge.num_planes < 4 {
                    edge.clipping_planes[edge.num_planes] = -pl;
                    edge.num_planes += 1;
                } else {
                    capped_planes += 1;
                }
            }
        }

        if capped_planes > 0 && log_enabled() {
            eprintln!(
                "mesh-proximity: non-manifold input, {} edge clipping planes dropped",
                capped_planes
            );
        }

        let mut edges = Vec::with_capacity(edge_map.len());
        let mut edge_index =
            FxHashMap::with_capacity_and_hasher(edge_map.len(), Default::default());
        for (key, edge) in edge_map {
            debug_assert!(edge.num_planes <= 4);
            edge_index.insert(key, edges.len() as u32);
            edges.push(edge);
        }

        Ok(Self {
            edges,
            faces,
            edge_index,
        })
    }
}
