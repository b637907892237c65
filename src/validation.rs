//! Brute-force closest-point reference.
//!
//! Scans every vertex, edge and face of the mesh in O(|V| + |E| + |F|),
//! applying the same feature-region rules as the accelerated path: an edge
//! competes only where the projection lands inside the segment, a face only
//! where the query sits inside its orthogonal prism. Ties resolve vertex,
//! then edge, then face, then lowest index.
//!
//! Useful for debugging, testing, and as a correctness oracle; far too slow
//! for production queries.

use std::collections::BTreeSet;

use glam::DVec3;

use crate::types::{ClosestPoint, PrimitiveKind};

/// Closest point on the mesh by exhaustive scan, in double precision.
pub fn brute_force_closest_point(
    positions: &[[f32; 3]],
    triangles: &[[u32; 3]],
    q: [f32; 3],
) -> ClosestPoint {
    let points: Vec<DVec3> = positions
        .iter()
        .map(|p| DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64))
        .collect();
    let qd = DVec3::new(q[0] as f64, q[1] as f64, q[2] as f64);

    let mut best = ClosestPoint::empty_mesh();
    let mut best_d2 = f64::INFINITY;

    for (i, p) in points.iter().enumerate() {
        let d2 = qd.distance_squared(*p);
        if d2 < best_d2 {
            best_d2 = d2;
            best = ClosestPoint {
                distance_squared: d2 as f32,
                primitive_index: i as u32,
                kind: PrimitiveKind::Vertex,
                closest_point: [p.x as f32, p.y as f32, p.z as f32],
            };
        }
    }

    let mut edges: BTreeSet<(u32, u32)> = BTreeSet::new();
    for tri in triangles {
        for i in 0..3 {
            let (a, b) = (tri[i], tri[(i + 1) % 3]);
            edges.insert(if a < b { (a, b) } else { (b, a) });
        }
    }

    for (e, &(a, b)) in edges.iter().enumerate() {
        let pa = points[a as usize];
        let pb = points[b as usize];
        let ab = pb - pa;
        let t = (qd - pa).dot(ab) / ab.dot(ab);
        if !(0.0..=1.0).contains(&t) {
            continue;
        }
        let projected = pa + ab * t;
        let d2 = qd.distance_squared(projected);
        if d2 < best_d2 {
            best_d2 = d2;
            best = ClosestPoint {
                distance_squared: d2 as f32,
                primitive_index: e as u32,
                kind: PrimitiveKind::Edge,
                closest_point: [
                    projected.x as f32,
                    projected.y as f32,
                    projected.z as f32,
                ],
            };
        }
    }

    for (f, tri) in triangles.iter().enumerate() {
        let p0 = points[tri[0] as usize];
        let p1 = points[tri[1] as usize];
        let p2 = points[tri[2] as usize];
        let n = match (p1 - p0).cross(p2 - p0).try_normalize() {
            Some(n) => n,
            None => continue,
        };

        // Inside the prism iff on the inner side of all three edge planes.
        let inward = [
            -(p2 - p1).cross(n).normalize(),
            -(p0 - p2).cross(n).normalize(),
            -(p1 - p0).cross(n).normalize(),
        ];
        let anchors = [p1, p2, p0];
        let inside = inward
            .iter()
            .zip(anchors)
            .all(|(dir, anchor)| dir.dot(qd - anchor) >= 0.0);
        if !inside {
            continue;
        }

        let signed = n.dot(qd - p0);
        let d2 = signed * signed;
        if d2 < best_d2 {
            best_d2 = d2;
            let projected = qd - signed * n;
            best = ClosestPoint {
                distance_squared: d2 as f32,
                primitive_index: f as u32,
                kind: PrimitiveKind::Face,
                closest_point: [
                    projected.x as f32,
                    projected.y as f32,
                    projected.z as f32,
                ],
            };
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_on_single_triangle() {
        let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let triangles = [[0u32, 1, 2]];

        let above = brute_force_closest_point(&positions, &triangles, [0.25, 0.25, 1.0]);
        assert_eq!(above.kind, PrimitiveKind::Face);
        assert!((above.distance_squared - 1.0).abs() < 1e-6);

        let near_edge = brute_force_closest_point(&positions, &triangles, [0.5, -0.1, 0.0]);
        assert_eq!(near_edge.kind, PrimitiveKind::Edge);
        assert!((near_edge.distance_squared - 0.01).abs() < 1e-6);

        let near_vertex = brute_force_closest_point(&positions, &triangles, [-0.2, -0.2, 0.0]);
        assert_eq!(near_vertex.kind, PrimitiveKind::Vertex);
        assert_eq!(near_vertex.primitive_index, 0);
        assert!((near_vertex.distance_squared - 0.08).abs() < 1e-6);
    }

    #[test]
    fn test_vertex_wins_exact_ties() {
        let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let triangles = [[0u32, 1, 2]];
        let on_vertex = brute_force_closest_point(&positions, &triangles, [0.0, 0.0, 0.0]);
        assert_eq!(on_vertex.kind, PrimitiveKind::Vertex);
        assert_eq!(on_vertex.distance_squared, 0.0);
    }

    #[test]
    fn test_empty_mesh_sentinel() {
        let got = brute_force_closest_point(&[], &[], [1.0, 2.0, 3.0]);
        assert!(got.distance_squared.is_infinite());
        assert_eq!(got.kind, PrimitiveKind::Vertex);
    }
}
