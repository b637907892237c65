//! Hot-path closest-point query.
//!
//! One BVH descent finds the nearest mesh vertex; the vertex's packed edge
//! and face batches are then scanned with lane-parallel closest-feature
//! tests. No allocation, no synchronization: the query reads immutable
//! arrays plus a fixed traversal stack, so any number of queries may run
//! concurrently against one structure.

use std::simd::cmp::SimdPartialOrd;
use std::simd::Select;

use glam::DVec3;

use crate::mesh::{project_line, project_plane};
use crate::simd::{self, F32s, I32s, LANES};
use crate::types::{ClosestPoint, PrimitiveKind};
use crate::AccelerationStructure;

pub(crate) fn calc_closest_point(accel: &AccelerationStructure, q: [f32; 3]) -> ClosestPoint {
    let Some((v, v_dist_sq)) = accel.bvh.closest_point(q) else {
        return ClosestPoint::empty_mesh();
    };

    let qx = F32s::splat(q[0]);
    let qy = F32s::splat(q[1]);
    let qz = F32s::splat(q[2]);

    let zero = F32s::splat(0.0);
    let one = F32s::splat(1.0);

    // Every lane starts at the nearest vertex; candidates must strictly
    // improve, so exact ties resolve vertex, then edge, then face.
    let mut best_d2 = F32s::splat(v_dist_sq);
    let mut best_idx = I32s::splat(v as i32);

    for pack in &accel.interception.edges[v as usize] {
        // Batches are sorted by their boxes' lower x; once the query is left
        // of this batch's floor no later batch can win.
        if q[0] < pack.min_x[0] {
            break;
        }

        let apx = qx - pack.start[0];
        let apy = qy - pack.start[1];
        let apz = qz - pack.start[2];

        let t = simd::dot3(apx, apy, apz, pack.dir[0], pack.dir[1], pack.dir[2])
            / pack.dir_len_squared;

        // Valid only where the projection lands inside the segment.
        let mut mask = zero.simd_le(t) & t.simd_le(one);

        let projected_x = t * pack.dir[0] + pack.start[0];
        let projected_y = t * pack.dir[1] + pack.start[1];
        let projected_z = t * pack.dir[2] + pack.start[2];
        let d2 = simd::distance_squared(qx, qy, qz, projected_x, projected_y, projected_z);

        mask &= d2.simd_lt(best_d2);
        best_d2 = mask.select(d2, best_d2);
        best_idx = mask.select(pack.primitive_idx, best_idx);
    }

    for pack in &accel.interception.faces[v as usize] {
        if q[0] < pack.min_x[0] {
            break;
        }

        // Inside the face's orthogonal prism iff on the non-negative side of
        // all three inward edge planes.
        let s0 = simd::eval_plane(qx, qy, qz, &pack.edge_planes[0]);
        let s1 = simd::eval_plane(qx, qy, qz, &pack.edge_planes[1]);
        let s2 = simd::eval_plane(qx, qy, qz, &pack.edge_planes[2]);
        let mut mask = s0.simd_ge(zero) & s1.simd_ge(zero) & s2.simd_ge(zero);

        let d = simd::eval_plane(qx, qy, qz, &pack.face_plane);
        let d2 = d * d;

        mask &= d2.simd_lt(best_d2);
        best_d2 = mask.select(d2, best_d2);
        best_idx = mask.select(pack.primitive_idx, best_idx);
    }

    // Horizontal reduction; the earliest lane wins on equality.
    let d2_arr = best_d2.to_array();
    let idx_arr = best_idx.to_array();
    let mut dist = d2_arr[0];
    let mut idx = idx_arr[0];
    for j in 1..LANES {
        if d2_arr[j] < dist {
            dist = d2_arr[j];
            idx = idx_arr[j];
        }
    }

    assemble(accel, q, dist, idx as u32)
}

/// Decode the global primitive index and compute the closest point itself.
fn assemble(
    accel: &AccelerationStructure,
    q: [f32; 3],
    distance_squared: f32,
    global_idx: u32,
) -> ClosestPoint {
    let nv = accel.points.len() as u32;
    let ne = accel.geometry.edges.len() as u32;
    let qd = DVec3::new(q[0] as f64, q[1] as f64, q[2] as f64);

    let (kind, primitive_index, cp) = if global_idx < nv {
        (
            PrimitiveKind::Vertex,
            global_idx,
            accel.points[global_idx as usize],
        )
    } else if global_idx < nv + ne {
        let e = global_idx - nv;
        let edge = &accel.geometry.edges[e as usize];
        let cp = project_line(
            qd,
            accel.points[edge.start as usize],
            accel.points[edge.end as usize],
        );
        (PrimitiveKind::Edge, e, cp)
    } else {
        let f = global_idx - nv - ne;
        let face = &accel.geometry.faces[f as usize];
        let cp = project_plane(qd, face.face_plane, face.pt_on_plane);
        (PrimitiveKind::Face, f, cp)
    };

    ClosestPoint {
        distance_squared,
        primitive_index,
        kind,
        closest_point: [cp.x as f32, cp.y as f32, cp.z as f32],
    }
}
