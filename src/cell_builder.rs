//! Per-vertex Voronoi cell construction.
//!
//! Each mesh vertex's cell is computed independently: start from the limit
//! cube and clip by bisector planes against neighbor candidates streamed in
//! ascending distance from the BVH. Candidates are fetched with an adaptive
//! k schedule; the scan stops once the next candidate is provably too far to
//! cut (its bisector lies beyond the cell's farthest corner).
//!
//! With equal weights the Laguerre diagram coincides with the Voronoi
//! diagram, so plain bisectors suffice. The sites whose bisectors survive on
//! the finished cell double as the vertex adjacency that the interception
//! solver's BFS walks.

use glam::DVec3;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::bvh::Bvh;
use crate::convex_cell::ConvexCell;

const INITIAL_K: usize = 24;

pub(crate) struct VertexCells {
    pub cells: Vec<ConvexCell>,
    pub neighbors: Vec<Vec<u32>>,
}

pub(crate) fn build_vertex_cells(
    points: &[DVec3],
    bvh: &Bvh,
    limit_cube_len: f64,
) -> VertexCells {
    let half_len = 2.0 * limit_cube_len;
    let built: Vec<(ConvexCell, Vec<u32>)> = maybe_par_into_iter!((0..points.len()))
        .map(|v| build_cell(v, points, bvh, half_len))
        .collect();

    let mut cells = Vec::with_capacity(built.len());
    let mut neighbors = Vec::with_capacity(built.len());
    for (cell, adjacent) in built {
        cells.push(cell);
        neighbors.push(adjacent);
    }

    // A bisector face exists on both of its cells, but epsilon clipping can
    // drop a near-degenerate face on one side only. Restore symmetry so the
    // adjacency is walkable in both directions.
    let mut missing: Vec<(usize, u32)> = Vec::new();
    for (v, adjacent) in neighbors.iter().enumerate() {
        for &n in adjacent {
            if neighbors[n as usize].binary_search(&(v as u32)).is_err() {
                missing.push((n as usize, v as u32));
            }
        }
    }
    for (n, v) in missing {
        neighbors[n].push(v);
    }
    for adjacent in &mut neighbors {
        adjacent.sort_unstable();
    }

    VertexCells { cells, neighbors }
}

fn build_cell(v: usize, points: &[DVec3], bvh: &Bvh, half_len: f64) -> (ConvexCell, Vec<u32>) {
    let site = points[v];
    let q = [site.x as f32, site.y as f32, site.z as f32];
    let candidate_cap = points.len() - 1;

    let mut cell = ConvexCell::from_box(half_len);
    let mut radius_sq = cell.max_radius_squared(site);
    let mut k = INITIAL_K.min(candidate_cap);
    let mut processed = 0usize;

    'grow: while processed < candidate_cap {
        let candidates = bvh.nearest_k(q, k, v as u32);
        for &(_, idx) in &candidates[processed..] {
            let other = points[idx as usize];
            let d2 = site.distance_squared(other);
            // Security radius: a bisector at distance d/2 cannot cut a cell
            // whose farthest corner is within d/2 of the site. Candidates
            // arrive in ascending distance, so the rest cannot cut either.
            if d2 >= 4.0 * radius_sq {
                break 'grow;
            }
            if cell.clip_by_bisector(site, other, idx) {
                if cell.is_empty() {
                    break 'grow;
                }
                radius_sq = cell.max_radius_squared(site);
            }
        }
        processed = candidates.len();
        if k >= candidate_cap {
            break;
        }
        k = (k * 4).min(candidate_cap);
    }

    let mut adjacent: Vec<u32> = cell.bisector_sites().collect();
    adjacent.sort_unstable();
    adjacent.dedup();
    (cell, adjacent)
}
