//! Public API integration tests for mesh-proximity.

mod support;

use mesh_proximity::{AccelerationStructure, BuildError, PrimitiveKind};
use support::meshes::{icosphere, unit_edge_tetrahedron, unit_triangle};

#[test]
fn test_build_basic() {
    let (positions, triangles) = unit_triangle();
    let accel = AccelerationStructure::build(&positions, &triangles, 4.0)
        .expect("build should succeed");

    assert_eq!(accel.num_vertices(), 3);
    assert_eq!(accel.num_edges(), 3);
    assert_eq!(accel.num_faces(), 1);
    assert_eq!(accel.positions(), positions);
    assert_eq!(accel.faces(), triangles);
}

#[test]
fn test_build_from_flat() {
    let positions = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices = [0u32, 1, 2];
    let accel = AccelerationStructure::from_flat(&positions, &indices, 4.0)
        .expect("flat build should succeed");
    assert_eq!(accel.num_vertices(), 3);
    assert_eq!(accel.num_faces(), 1);

    let result = AccelerationStructure::from_flat(&positions[..8], &indices, 4.0);
    assert!(matches!(result, Err(BuildError::InvalidInput(_))));
}

#[test]
fn test_build_rejects_non_finite() {
    let positions = [[0.0f32, 0.0, 0.0], [1.0, f32::NAN, 0.0], [0.0, 1.0, 0.0]];
    let triangles = [[0u32, 1, 2]];
    let result = AccelerationStructure::build(&positions, &triangles, 4.0);
    assert!(matches!(result, Err(BuildError::InvalidInput(_))));
}

#[test]
fn test_build_rejects_bad_indices() {
    let (positions, _) = unit_triangle();

    let out_of_range = AccelerationStructure::build(&positions, &[[0, 1, 3]], 4.0);
    assert!(matches!(out_of_range, Err(BuildError::InvalidInput(_))));

    let repeated = AccelerationStructure::build(&positions, &[[0, 1, 1]], 4.0);
    assert!(matches!(repeated, Err(BuildError::InvalidInput(_))));
}

#[test]
fn test_build_rejects_degenerate_triangle() {
    let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
    let triangles = [[0u32, 1, 2]];
    let result = AccelerationStructure::build(&positions, &triangles, 4.0);
    assert!(matches!(
        result,
        Err(BuildError::DegenerateGeometry { face: 0, .. })
    ));
}

#[test]
fn test_build_rejects_bad_limit_cube() {
    let (positions, triangles) = unit_triangle();
    for bad in [0.0f32, -1.0, f32::NAN, f32::INFINITY] {
        let result = AccelerationStructure::build(&positions, &triangles, bad);
        assert!(matches!(result, Err(BuildError::InvalidInput(_))), "{}", bad);
    }
}

#[test]
fn test_duplicate_vertices_are_merged() {
    // Vertex 3 duplicates vertex 0 bit for bit.
    let positions = [
        [0.0f32, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0],
    ];
    let triangles = [[3u32, 1, 2]];
    let accel = AccelerationStructure::build(&positions, &triangles, 4.0).unwrap();

    assert_eq!(accel.num_vertices(), 3);
    let faces = accel.faces();
    let built = accel.positions();
    assert_eq!(built[faces[0][0] as usize], [0.0, 0.0, 0.0]);
}

#[test]
fn test_merge_collapsing_a_triangle_is_degenerate() {
    // Vertices 0 and 3 are identical, so the triangle degenerates after the
    // merge even though its raw indices were distinct.
    let positions = [
        [0.0f32, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0],
    ];
    let triangles = [[0u32, 3, 1]];
    let result = AccelerationStructure::build(&positions, &triangles, 4.0);
    assert!(matches!(result, Err(BuildError::DegenerateGeometry { .. })));
}

#[test]
fn test_empty_mesh_sentinel() {
    let accel = AccelerationStructure::build(&[], &[], 4.0).unwrap();
    let hit = accel.closest_point([0.5, -1.0, 2.0]);
    assert!(hit.distance_squared.is_infinite());
    assert_eq!(hit.kind, PrimitiveKind::Vertex);
    assert_eq!(hit.primitive_index, 0);
    assert_eq!(hit.closest_point, [0.0, 0.0, 0.0]);
}

#[test]
fn test_point_cloud_queries_hit_vertices() {
    let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]];
    let accel = AccelerationStructure::build(&positions, &[], 4.0).unwrap();
    assert_eq!(accel.num_edges(), 0);
    assert_eq!(accel.num_faces(), 0);

    let hit = accel.closest_point([0.9, 0.1, 0.0]);
    assert_eq!(hit.kind, PrimitiveKind::Vertex);
    assert_eq!(hit.primitive_index, 1);
}

#[test]
fn test_edge_accessors_consistent() {
    let (positions, triangles) = unit_edge_tetrahedron();
    let accel = AccelerationStructure::build(&positions, &triangles, 4.0).unwrap();

    assert_eq!(accel.num_edges(), 6);
    let edges = accel.edge_vertices();
    for (i, &(a, b)) in edges.iter().enumerate() {
        assert!(a < b);
        assert_eq!(accel.edge(i), (a, b));
    }
}

#[test]
fn test_face_edges_round_trip() {
    for (positions, triangles) in [unit_triangle(), unit_edge_tetrahedron(), icosphere(1)] {
        let accel = AccelerationStructure::build(&positions, &triangles, 4.0).unwrap();
        let face_edges = accel.face_edges();
        let edge_vertices = accel.edge_vertices();
        let faces = accel.faces();

        assert_eq!(face_edges.len(), faces.len());
        for (f, edges) in face_edges.iter().enumerate() {
            let tri = faces[f];
            for (i, &e) in edges.iter().enumerate() {
                let (a, b) = edge_vertices[e as usize];
                let (u, v) = (tri[i], tri[(i + 1) % 3]);
                let expect = if u < v { (u, v) } else { (v, u) };
                assert_eq!((a, b), expect, "face {} edge slot {}", f, i);
            }
        }
    }
}
