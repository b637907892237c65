//! Interception lists: which primitives can beat a given nearest vertex.
//!
//! A vertex `v` is *intercepted* by an edge or face when `v`'s Voronoi cell,
//! clipped to the primitive's feature region, contains a point strictly
//! closer to the primitive than to `v`. Exactly those primitives can win a
//! query whose nearest vertex is `v`, so the query only ever scans `v`'s
//! list. Each entry carries the bounding box of its closer-than-`v` region;
//! per-vertex lists are sorted by the box's lower x so the query can stop
//! scanning once `q.x` falls below the batch floor.
//!
//! Discovery runs one BFS per primitive over the vertex adjacency, seeded at
//! the primitive's incident vertices and expanding only from intercepted
//! vertices. Primitives are processed in parallel; per-primitive results are
//! transposed into per-vertex lists afterwards.

use std::collections::VecDeque;

use glam::{DVec3, DVec4};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::cell_builder::VertexCells;
use crate::convex_cell::ConvexCell;
use crate::mesh::{
    distance_to_line_squared, distance_to_plane_squared, BoundingBox, EdgeData, FaceData,
    MeshGeometry,
};
use crate::simd::{F32s, I32s, LANES};

/// A batch of `LANES` intercepted edges for one vertex, in SoA lanes.
/// `primitive_idx` is globally encoded as `edge_index + num_vertices`.
#[derive(Clone, Copy)]
pub(crate) struct PackedEdge {
    pub min_x: F32s,
    pub start: [F32s; 3],
    pub dir: [F32s; 3],
    pub dir_len_squared: F32s,
    pub primitive_idx: I32s,
}

/// A batch of `LANES` intercepted faces for one vertex, in SoA lanes.
/// `primitive_idx` is globally encoded as
/// `face_index + num_vertices + num_edges`.
#[derive(Clone, Copy)]
pub(crate) struct PackedFace {
    pub min_x: F32s,
    pub face_plane: [F32s; 4],
    pub edge_planes: [[F32s; 4]; 3],
    pub primitive_idx: I32s,
}

pub(crate) struct InterceptionLists {
    pub edges: Vec<Vec<PackedEdge>>,
    pub faces: Vec<Vec<PackedFace>>,
}

pub(crate) fn compute_interception_lists(
    points: &[DVec3],
    triangles: &[[u32; 3]],
    geometry: &MeshGeometry,
    cells: &VertexCells,
) -> InterceptionLists {
    let nb_points = points.len();
    let nb_edges = geometry.edges.len();

    let face_hits: Vec<Vec<(u32, BoundingBox)>> = maybe_par_into_iter!((0..triangles.len()))
        .map(|f| {
            let plane = geometry.faces[f].face_plane;
            collect_hits(
                &triangles[f][..],
                &geometry.faces[f].clipping_planes,
                |p| distance_to_plane_squared(p, plane),
                points,
                cells,
            )
        })
        .collect();

    let edge_hits: Vec<Vec<(u32, BoundingBox)>> = maybe_par_into_iter!((0..nb_edges))
        .map(|e| {
            let edge = &geometry.edges[e];
            let a = points[edge.start as usize];
            let b = points[edge.end as usize];
            collect_hits(
                &[edge.start, edge.end],
                edge.planes(),
                |p| distance_to_line_squared(p, a, b),
                points,
                cells,
            )
        })
        .collect();

    // Transpose the per-primitive hit lists into per-vertex lists. Primitive
    // order is ascending here, which keeps the result independent of how the
    // parallel passes were scheduled.
    let mut edge_lists: Vec<Vec<(u32, BoundingBox)>> = vec![Vec::new(); nb_points];
    for (e, hits) in edge_hits.iter().enumerate() {
        for &(v, bb) in hits {
            edge_lists[v as usize].push((e as u32, bb));
        }
    }
    let mut face_lists: Vec<Vec<(u32, BoundingBox)>> = vec![Vec::new(); nb_points];
    for (f, hits) in face_hits.iter().enumerate() {
        for &(v, bb) in hits {
            face_lists[v as usize].push((f as u32, bb));
        }
    }

    let mut edges_packed = Vec::with_capacity(nb_points);
    let mut faces_packed = Vec::with_capacity(nb_points);
    for v in 0..nb_points {
        edge_lists[v].sort_by(|a, b| a.1.lower.x.total_cmp(&b.1.lower.x));
        face_lists[v].sort_by(|a, b| a.1.lower.x.total_cmp(&b.1.lower.x));
        edges_packed.push(pack_edges(&edge_lists[v], points, &geometry.edges, nb_points));
        faces_packed.push(pack_faces(&face_lists[v], &geometry.faces, nb_points, nb_edges));
    }

    InterceptionLists {
        edges: edges_packed,
        faces: faces_packed,
    }
}

/// BFS from the primitive's incident vertices: clip each visited vertex's
/// cell by the primitive's clipping planes, run the interception test, and
/// expand through the adjacency only from intercepted vertices.
fn collect_hits<F>(
    seeds: &[u32],
    planes: &[DVec4],
    dist2_to_primitive: F,
    points: &[DVec3],
    cells: &VertexCells,
) -> Vec<(u32, BoundingBox)>
where
    F: Fn(DVec3) -> f64,
{
    let mut visited: FxHashSet<u32> = seeds.iter().copied().collect();
    let mut queue: VecDeque<u32> = seeds.iter().copied().collect();
    let mut hits = Vec::new();

    while let Some(v) = queue.pop_front() {
        let mut cell = cells.cells[v as usize].clone();
        for &pl in planes {
            cell.clip_by_plane(pl);
        }
        if cell.is_empty() {
            continue;
        }

        let mut bb = BoundingBox::default();
        if !interception_test(&cell, points[v as usize], &dist2_to_primitive, &mut bb) {
            continue;
        }
        hits.push((v, bb));

        for &n in &cells.neighbors[v as usize] {
            if visited.insert(n) {
                queue.push_back(n);
            }
        }
    }
    hits
}

/// Walk every boundary ring of the clipped cell, classifying corners by
/// whether the primitive or the site is closer. Returns true when any corner
/// lies on the primitive's side; `bb` collects those corners plus the
/// crossing points where the classification flips along a ring edge.
fn interception_test<F>(cell: &ConvexCell, site: DVec3, dist2_to_primitive: &F, bb: &mut BoundingBox) -> bool
where
    F: Fn(DVec3) -> f64,
{
    let mut intercepting = false;

    for ring in cell.rings() {
        let mut first_pt = DVec3::ZERO;
        let mut first_region = 0i32;
        let mut last_pt = DVec3::ZERO;
        let mut last_region = 0i32;

        for (i, &pt) in ring.iter().enumerate() {
            let region = if dist2_to_primitive(pt) < pt.distance_squared(site) {
                -1
            } else {
                1
            };

            if i == 0 {
                first_pt = pt;
                first_region = region;
            }

            if region == -1 {
                bb.extend(pt);
                intercepting = true;
            }

            // Every cell edge appears in two rings, once per direction;
            // solving only the -1 -> +1 flip visits each crossing once.
            if last_region == -1 && region == 1 {
                bb.extend(region_crossing(last_pt, pt, site, dist2_to_primitive));
            }

            last_pt = pt;
            last_region = region;
        }

        // Close the ring.
        if last_region == -1 && first_region == 1 {
            bb.extend(region_crossing(last_pt, first_pt, site, dist2_to_primitive));
        }
    }

    intercepting
}

/// Bisection along the segment from `a` (primitive side) to `b` (site side)
/// for the point where both are equally close. Step count is derived from
/// the segment length so the result is within a relative 1e-5.
fn region_crossing<F>(a: DVec3, b: DVec3, site: DVec3, dist2_to_primitive: &F) -> DVec3
where
    F: Fn(DVec3) -> f64,
{
    const TOL: f64 = 1e-5;

    let mut lo = 0.0f64;
    let mut hi = 1.0f64;
    let mut steps = ((a - b).length() / TOL).log2() as i32;
    if steps <= 0 {
        steps = 1;
    }
    for _ in 0..steps {
        let mid = 0.5 * (lo + hi);
        let cur = b.lerp(a, mid);
        if cur.distance_squared(site) > dist2_to_primitive(cur) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    b.lerp(a, lo)
}

#[inline]
fn dup_lane_f(v: &mut F32s, j: usize) {
    let prev = v.as_array()[j - 1];
    v.as_mut_array()[j] = prev;
}

#[inline]
fn dup_lane_i(v: &mut I32s, j: usize) {
    let prev = v.as_array()[j - 1];
    v.as_mut_array()[j] = prev;
}

/// Pack a sorted per-vertex edge list into SIMD batches. Trailing lanes of
/// the last batch duplicate the previous valid lane, never a sentinel: a
/// duplicated lane always refers to a legitimate primitive and cannot win
/// anything its original would not.
fn pack_edges(
    list: &[(u32, BoundingBox)],
    points: &[DVec3],
    edges: &[EdgeData],
    nb_points: usize,
) -> Vec<PackedEdge> {
    let num_batches = (list.len() + LANES - 1) / LANES;
    let mut out = Vec::with_capacity(num_batches);

    for batch in 0..num_batches {
        let mut packed = PackedEdge {
            min_x: F32s::splat(0.0),
            start: [F32s::splat(0.0); 3],
            dir: [F32s::splat(0.0); 3],
            dir_len_squared: F32s::splat(0.0),
            primitive_idx: I32s::splat(0),
        };
        for j in 0..LANES {
            let k = batch * LANES + j;
            if k < list.len() {
                let (e, bb) = list[k];
                let edge = &edges[e as usize];
                let s = points[edge.start as usize];
                let t = points[edge.end as usize];
                packed.min_x.as_mut_array()[j] = bb.lower.x as f32;
                for d in 0..3 {
                    packed.start[d].as_mut_array()[j] = s.to_array()[d] as f32;
                    packed.dir[d].as_mut_array()[j] = (t.to_array()[d] - s.to_array()[d]) as f32;
                }
                packed.dir_len_squared.as_mut_array()[j] = s.distance_squared(t) as f32;
                packed.primitive_idx.as_mut_array()[j] = (e as usize + nb_points) as i32;
            } else {
                debug_assert!(j > 0);
                dup_lane_f(&mut packed.min_x, j);
                for d in 0..3 {
                    dup_lane_f(&mut packed.start[d], j);
                    dup_lane_f(&mut packed.dir[d], j);
                }
                dup_lane_f(&mut packed.dir_len_squared, j);
                dup_lane_i(&mut packed.primitive_idx, j);
            }
        }
        out.push(packed);
    }
    out
}

fn pack_faces(
    list: &[(u32, BoundingBox)],
    faces: &[FaceData],
    nb_points: usize,
    nb_edges: usize,
) -> Vec<PackedFace> {
    let num_batches = (list.len() + LANES - 1) / LANES;
    let mut out = Vec::with_capacity(num_batches);

    for batch in 0..num_batches {
        let mut packed = PackedFace {
            min_x: F32s::splat(0.0),
            face_plane: [F32s::splat(0.0); 4],
            edge_planes: [[F32s::splat(0.0); 4]; 3],
            primitive_idx: I32s::splat(0),
        };
        for j in 0..LANES {
            let k = batch * LANES + j;
            if k < list.len() {
                let (f, bb) = list[k];
                let face = &faces[f as usize];
                packed.min_x.as_mut_array()[j] = bb.lower.x as f32;
                for d in 0..4 {
                    packed.face_plane[d].as_mut_array()[j] = face.face_plane.to_array()[d] as f32;
                    for (p, plane) in face.clipping_planes.iter().enumerate() {
                        packed.edge_planes[p][d].as_mut_array()[j] = plane.to_array()[d] as f32;
                    }
                }
                packed.primitive_idx.as_mut_array()[j] =
                    (f as usize + nb_points + nb_edges) as i32;
            } else {
                debug_assert!(j > 0);
                dup_lane_f(&mut packed.min_x, j);
                for d in 0..4 {
                    dup_lane_f(&mut packed.face_plane[d], j);
                    for p in 0..3 {
                        dup_lane_f(&mut packed.edge_planes[p][d], j);
                    }
                }
                dup_lane_i(&mut packed.primitive_idx, j);
            }
        }
        out.push(packed);
    }
    out
}
