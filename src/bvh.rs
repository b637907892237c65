//! 4-way BVH over mesh vertices with SIMD-packed leaves.
//!
//! Construction partitions a shuffled index range top-down: a median split
//! on axis `depth % 3`, then a median split of each half on the next axis,
//! giving four roughly equal children per node. Child AABBs live in a
//! structure-of-arrays layout so a query computes the point-to-box distance
//! of all four children with one set of SIMD ops. Leaves hold up to
//! `NUM_PACKETS` packets of `LANES` points each in SoA form.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::simd::{cmp::SimdPartialOrd, f32x4, i32x4, num::SimdFloat, Select};

use glam::DVec3;

use crate::mesh::BoundingBox;
use crate::simd::{self, F32s, I32s, LANES};

pub(crate) const NUM_PACKETS: usize = 8;
const MAX_STACK: usize = 64;

/// A f32 wrapper that implements Ord using total_cmp.
/// NaN is not rejected, just ordered consistently.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrdF32(f32);

impl Eq for OrdF32 {}

impl PartialOrd for OrdF32 {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdF32 {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Internal node: four child AABBs in SoA form plus four child indices.
/// A negative child index `-(i+1)` refers to `leaf_ranges[i]`.
#[derive(Clone, Copy)]
struct Node {
    min_corners: [f32x4; 3],
    max_corners: [f32x4; 3],
    children: i32x4,
}

impl Node {
    fn zeroed() -> Self {
        Self {
            min_corners: [f32x4::splat(0.0); 3],
            max_corners: [f32x4::splat(0.0); 3],
            children: i32x4::splat(0),
        }
    }
}

/// One packet of `LANES` points. Empty lanes hold `f32::MAX` coordinates and
/// index -1 so they can never win a distance comparison.
#[derive(Clone, Copy)]
struct LeafNode {
    xs: F32s,
    ys: F32s,
    zs: F32s,
    indices: I32s,
}

impl LeafNode {
    fn empty() -> Self {
        Self {
            xs: F32s::splat(f32::MAX),
            ys: F32s::splat(f32::MAX),
            zs: F32s::splat(f32::MAX),
            indices: I32s::splat(-1),
        }
    }
}

/// Squared distance from the query to each of the node's four child boxes.
#[inline(always)]
fn point_to_boxes_squared(node: &Node, qx: f32x4, qy: f32x4, qz: f32x4) -> f32x4 {
    let zero = f32x4::splat(0.0);
    let dx = (node.min_corners[0] - qx)
        .simd_max(qx - node.max_corners[0])
        .simd_max(zero);
    let dy = (node.min_corners[1] - qy)
        .simd_max(qy - node.max_corners[1])
        .simd_max(zero);
    let dz = (node.min_corners[2] - qz)
        .simd_max(qz - node.max_corners[2])
        .simd_max(zero);
    simd::length_squared(dx, dy, dz)
}

/// Order the four child slots by descending distance with a 5-compare
/// sorting network, so pushing in order leaves the nearest on top.
#[inline(always)]
fn sort4_descending(dist: f32x4) -> [usize; 4] {
    let d = dist.to_array();
    let mut idx = [0usize, 1, 2, 3];
    let cswap = |idx: &mut [usize; 4], i: usize, j: usize| {
        if d[idx[i]] < d[idx[j]] {
            idx.swap(i, j);
        }
    };
    cswap(&mut idx, 0, 1);
    cswap(&mut idx, 2, 3);
    cswap(&mut idx, 0, 2);
    cswap(&mut idx, 1, 3);
    cswap(&mut idx, 1, 2);
    idx
}

#[inline]
fn coord(points: &[DVec3], i: u32, axis: usize) -> f64 {
    points[i as usize].to_array()[axis]
}

fn partition(points: &[DVec3], indices: &mut [u32], mid: usize, axis: usize) {
    if indices.len() > 1 && mid < indices.len() {
        indices.select_nth_unstable_by(mid, |&a, &b| {
            coord(points, a, axis).total_cmp(&coord(points, b, axis))
        });
    }
}

pub(crate) struct Bvh {
    nodes: Vec<Node>,
    leaves: Vec<LeafNode>,
    leaf_ranges: Vec<(u32, u32)>,
}

impl Bvh {
    pub fn new(points: &[DVec3]) -> Self {
        let mut bvh = Self {
            nodes: Vec::new(),
            leaves: Vec::new(),
            leaf_ranges: Vec::new(),
        };
        if points.is_empty() {
            return bvh;
        }
        let mut indices: Vec<u32> = (0..points.len() as u32).collect();
        let mut root_box = BoundingBox::default();
        let len = indices.len();
        let root = bvh.construct(points, &mut indices, 0, len, 0, &mut root_box);
        debug_assert!(root == 0 || root < 0);
        bvh
    }

    /// Nearest vertex to `q` and its squared distance. None for empty input.
    pub fn closest_point(&self, q: [f32; 3]) -> Option<(u32, f32)> {
        if self.leaf_ranges.is_empty() {
            return None;
        }

        #[derive(Clone, Copy)]
        struct StackEntry {
            node: i32,
            min_dist_sq: f32,
        }

        let mut stack = [StackEntry {
            node: 0,
            min_dist_sq: 0.0,
        }; MAX_STACK];
        let mut stack_len = 1usize;
        if self.nodes.is_empty() {
            stack[0].node = -1;
        }

        let mut best_dist_sq = f32::MAX;
        let mut best_idx = -1i32;

        let qx4 = f32x4::splat(q[0]);
        let qy4 = f32x4::splat(q[1]);
        let qz4 = f32x4::splat(q[2]);

        let qxn = F32s::splat(q[0]);
        let qyn = F32s::splat(q[1]);
        let qzn = F32s::splat(q[2]);

        while stack_len > 0 {
            stack_len -= 1;
            let current = stack[stack_len];
            if current.min_dist_sq >= best_dist_sq {
                continue;
            }
            if current.node < 0 {
                let (first, num) = self.leaf_ranges[(-current.node - 1) as usize];
                self.update_closest(
                    qxn,
                    qyn,
                    qzn,
                    first as usize,
                    num as usize,
                    &mut best_dist_sq,
                    &mut best_idx,
                );
                continue;
            }

            let node = &self.nodes[current.node as usize];
            let distances = point_to_boxes_squared(node, qx4, qy4, qz4);
            let order = sort4_descending(distances);
            let children = node.children.to_array();
            let dist_arr = distances.to_array();

            // Farthest first: the nearest child ends up on top of the stack.
            for &c in &order {
                if dist_arr[c] < best_dist_sq {
                    debug_assert!(stack_len < MAX_STACK);
                    stack[stack_len] = StackEntry {
                        node: children[c],
                        min_dist_sq: dist_arr[c],
                    };
                    stack_len += 1;
                }
            }
        }

        if best_idx < 0 {
            None
        } else {
            Some((best_idx as u32, best_dist_sq))
        }
    }

    /// Up to `k` nearest vertices to `q` excluding `skip`, ascending by
    /// squared distance. Build-phase helper for cell construction.
    pub fn nearest_k(&self, q: [f32; 3], k: usize, skip: u32) -> Vec<(f32, u32)> {
        if k == 0 || self.leaf_ranges.is_empty() {
            return Vec::new();
        }

        let mut heap: BinaryHeap<(OrdF32, u32)> = BinaryHeap::with_capacity(k + 1);
        let mut stack: Vec<(i32, f32)> = Vec::with_capacity(MAX_STACK);
        stack.push((if self.nodes.is_empty() { -1 } else { 0 }, 0.0));

        let qx4 = f32x4::splat(q[0]);
        let qy4 = f32x4::splat(q[1]);
        let qz4 = f32x4::splat(q[2]);

        while let Some((node, min_dist_sq)) = stack.pop() {
            let bound = if heap.len() == k {
                heap.peek().unwrap().0 .0
            } else {
                f32::MAX
            };
            if min_dist_sq >= bound {
                continue;
            }

            if node < 0 {
                let (first, num) = self.leaf_ranges[(-node - 1) as usize];
                for leaf in &self.leaves[first as usize..(first + num) as usize] {
                    let xs = leaf.xs.to_array();
                    let ys = leaf.ys.to_array();
                    let zs = leaf.zs.to_array();
                    let ind = leaf.indices.to_array();
                    for j in 0..LANES {
                        if ind[j] < 0 || ind[j] as u32 == skip {
                            continue;
                        }
                        let dx = q[0] - xs[j];
                        let dy = q[1] - ys[j];
                        let dz = q[2] - zs[j];
                        let d2 = dx * dx + dy * dy + dz * dz;
                        if heap.len() < k {
                            heap.push((OrdF32(d2), ind[j] as u32));
                        } else if d2 < heap.peek().unwrap().0 .0 {
                            heap.push((OrdF32(d2), ind[j] as u32));
                            heap.pop();
                        }
                    }
                }
                continue;
            }

            let node_ref = &self.nodes[node as usize];
            let distances = point_to_boxes_squared(node_ref, qx4, qy4, qz4);
            let order = sort4_descending(distances);
            let children = node_ref.children.to_array();
            let dist_arr = distances.to_array();
            for &c in &order {
                if dist_arr[c] < bound {
                    stack.push((children[c], dist_arr[c]));
                }
            }
        }

        let mut out: Vec<(f32, u32)> = heap.into_iter().map(|(d, i)| (d.0, i)).collect();
        out.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        out
    }

    fn update_closest(
        &self,
        qx: F32s,
        qy: F32s,
        qz: F32s,
        first_packet: usize,
        num_packets: usize,
        best_dist_sq: &mut f32,
        best_idx: &mut i32,
    ) {
        let mut min_dist = F32s::splat(*best_dist_sq);
        let mut min_idx = I32s::splat(*best_idx);

        for leaf in &self.leaves[first_packet..first_packet + num_packets] {
            let dist_sq = simd::distance_squared(qx, qy, qz, leaf.xs, leaf.ys, leaf.zs);
            // Lanes that do not improve keep their previous index.
            let keep = dist_sq.simd_ge(min_dist);
            min_idx = keep.select(min_idx, leaf.indices);
            min_dist = min_dist.simd_min(dist_sq);
        }

        let dist = min_dist.to_array();
        let idx = min_idx.to_array();
        for j in 0..LANES {
            if dist[j] < *best_dist_sq {
                *best_dist_sq = dist[j];
                *best_idx = idx[j];
            }
        }
    }

    fn construct(
        &mut self,
        points: &[DVec3],
        indices: &mut [u32],
        begin: usize,
        end: usize,
        depth: usize,
        node_box: &mut BoundingBox,
    ) -> i32 {
        if end - begin <= NUM_PACKETS * LANES {
            *node_box = BoundingBox::default();
            for &i in &indices[begin..end] {
                node_box.extend(points[i as usize]);
            }

            let leaf_idx = self.leaf_ranges.len() as i32;
            let first = self.leaves.len() as u32;
            let num_packets = (end - begin + LANES - 1) / LANES;
            self.leaf_ranges.push((first, num_packets as u32));

            for p in 0..num_packets {
                let mut leaf = LeafNode::empty();
                for j in 0..LANES {
                    let k = p * LANES + j;
                    if k < end - begin {
                        let idx = indices[begin + k];
                        let pt = points[idx as usize];
                        leaf.xs.as_mut_array()[j] = pt.x as f32;
                        leaf.ys.as_mut_array()[j] = pt.y as f32;
                        leaf.zs.as_mut_array()[j] = pt.z as f32;
                        leaf.indices.as_mut_array()[j] = idx as i32;
                    }
                }
                self.leaves.push(leaf);
            }

            return -(leaf_idx + 1);
        }

        let primary_axis = depth % 3;
        let secondary_axis = (primary_axis + 1) % 3;

        let mid = (begin + end) / 2;
        partition(points, &mut indices[begin..end], mid - begin, primary_axis);

        let split1 = (begin + mid) / 2;
        let split2 = (mid + end) / 2;
        partition(points, &mut indices[begin..mid], split1 - begin, secondary_axis);
        partition(points, &mut indices[mid..end], split2 - mid, secondary_axis);

        let node_idx = self.nodes.len();
        self.nodes.push(Node::zeroed());

        let ranges = [(begin, split1), (split1, mid), (mid, split2), (split2, end)];
        let mut child_boxes = [BoundingBox::default(); 4];
        let mut children = [0i32; 4];
        for (c, &(b, e)) in ranges.iter().enumerate() {
            children[c] = self.construct(points, indices, b, e, depth + 2, &mut child_boxes[c]);
        }

        let mut node = Node::zeroed();
        node.children = i32x4::from_array(children);
        for axis in 0..3 {
            for c in 0..4 {
                node.min_corners[axis].as_mut_array()[c] =
                    child_boxes[c].lower.to_array()[axis] as f32;
                node.max_corners[axis].as_mut_array()[c] =
                    child_boxes[c].upper.to_array()[axis] as f32;
            }
        }
        self.nodes[node_idx] = node;

        *node_box = child_boxes[0];
        for b in &child_boxes[1..] {
            node_box.extend_box(b);
        }

        node_idx as i32
    }
}
