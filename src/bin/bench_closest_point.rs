//! Build + query throughput benchmark.
//!
//! Usage: bench_closest_point [num_subdivisions] [num_queries]
//! Mesh is a subdivided icosphere; queries are uniform in [-2, 2]^3.

use std::collections::HashMap;
use std::time::Instant;

use mesh_proximity::AccelerationStructure;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn normalize(v: [f64; 3]) -> [f64; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    [v[0] / len, v[1] / len, v[2] / len]
}

fn icosphere(subdivisions: u32) -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
    let phi = (1.0 + 5.0f64.sqrt()) / 2.0;
    let mut vertices: Vec<[f64; 3]> = [
        [-1.0, phi, 0.0],
        [1.0, phi, 0.0],
        [-1.0, -phi, 0.0],
        [1.0, -phi, 0.0],
        [0.0, -1.0, phi],
        [0.0, 1.0, phi],
        [0.0, -1.0, -phi],
        [0.0, 1.0, -phi],
        [phi, 0.0, -1.0],
        [phi, 0.0, 1.0],
        [-phi, 0.0, -1.0],
        [-phi, 0.0, 1.0],
    ]
    .iter()
    .map(|&v| normalize(v))
    .collect();

    let mut faces: Vec<[u32; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let mut midpoint = |x: u32, y: u32, vertices: &mut Vec<[f64; 3]>| -> u32 {
                let key = if x < y { (x, y) } else { (y, x) };
                *midpoints.entry(key).or_insert_with(|| {
                    let px = vertices[x as usize];
                    let py = vertices[y as usize];
                    let mid = normalize([
                        0.5 * (px[0] + py[0]),
                        0.5 * (px[1] + py[1]),
                        0.5 * (px[2] + py[2]),
                    ]);
                    vertices.push(mid);
                    (vertices.len() - 1) as u32
                })
            };
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            next.push([a, ab, ca]);
            next.push([ab, b, bc]);
            next.push([ca, bc, c]);
            next.push([ab, bc, ca]);
        }
        faces = next;
    }

    let positions = vertices
        .iter()
        .map(|v| [v[0] as f32, v[1] as f32, v[2] as f32])
        .collect();
    (positions, faces)
}

fn main() {
    let mut args = std::env::args().skip(1);
    let subdivisions: u32 = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(4);
    let num_queries: usize = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1_000_000);

    let (positions, triangles) = icosphere(subdivisions);
    println!(
        "mesh: {} vertices, {} faces (icosphere {})",
        positions.len(),
        triangles.len(),
        subdivisions
    );

    let start = Instant::now();
    let accel = AccelerationStructure::build(&positions, &triangles, 4.0)
        .expect("build should succeed");
    let build_time = start.elapsed();
    println!(
        "build: {:.1} ms ({} edges)",
        build_time.as_secs_f64() * 1000.0,
        accel.num_edges()
    );

    let mut rng = ChaCha8Rng::seed_from_u64(12345);
    let queries: Vec<[f32; 3]> = (0..num_queries)
        .map(|_| {
            [
                rng.gen_range(-2.0f32..2.0),
                rng.gen_range(-2.0f32..2.0),
                rng.gen_range(-2.0f32..2.0),
            ]
        })
        .collect();

    // Warmup.
    let mut checksum = 0.0f64;
    for q in queries.iter().take(10_000) {
        checksum += accel.closest_point(*q).distance_squared as f64;
    }

    let start = Instant::now();
    for q in &queries {
        checksum += accel.closest_point(*q).distance_squared as f64;
    }
    let elapsed = start.elapsed();

    let per_query_ns = elapsed.as_nanos() as f64 / num_queries as f64;
    println!(
        "queries: {} in {:.1} ms ({:.0} ns/query, {:.2} Mq/s)",
        num_queries,
        elapsed.as_secs_f64() * 1000.0,
        per_query_ns,
        1000.0 / per_query_ns
    );
    println!("checksum: {:.6}", checksum);
}
