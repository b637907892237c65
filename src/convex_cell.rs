//! Convex cells bounded by half-spaces.
//!
//! A cell is stored as its set of bounding planes, each with the ordered
//! ring of boundary corners lying on that plane. Clipping keeps the
//! `plane · (p, 1) ≥ 0` side: every ring is clipped against the half-space
//! and the new cap face is assembled from the crossing points, ordered
//! around the clipping plane's normal.
//!
//! Cells start from an axis-aligned cube, so they are always bounded and
//! there is no vertex at infinity to special-case during traversal.

use glam::{DVec3, DVec4};

use crate::mesh::{eval_plane, plane, plane_normal};

/// Source tag for planes that are not a site bisector (box walls and
/// primitive clipping planes).
pub(crate) const NO_SITE: u32 = u32::MAX;

// Classification tolerance for ring corners against a clipping plane.
// Coordinates are bounded by the limit cube, so an absolute epsilon works.
const PLANE_EPS: f64 = 1e-9;
// Squared distance under which two cap corners count as the same point.
const MERGE_EPS_SQ: f64 = 1e-16;

#[derive(Debug, Clone)]
struct CellFace {
    plane: DVec4,
    source: u32,
    ring: Vec<DVec3>,
}

#[derive(Debug, Clone)]
pub(crate) struct ConvexCell {
    faces: Vec<CellFace>,
}

impl ConvexCell {
    /// Cell spanning the cube `[-half_len, half_len]^3`.
    pub fn from_box(half_len: f64) -> Self {
        let h = half_len;
        let c = DVec3::new;
        let wall = |n: DVec3, ring: Vec<DVec3>| CellFace {
            plane: plane(n, h),
            source: NO_SITE,
            ring,
        };
        let faces = vec![
            wall(
                DVec3::X,
                vec![c(-h, -h, -h), c(-h, h, -h), c(-h, h, h), c(-h, -h, h)],
            ),
            wall(
                DVec3::NEG_X,
                vec![c(h, -h, -h), c(h, -h, h), c(h, h, h), c(h, h, -h)],
            ),
            wall(
                DVec3::Y,
                vec![c(-h, -h, -h), c(h, -h, -h), c(h, -h, h), c(-h, -h, h)],
            ),
            wall(
                DVec3::NEG_Y,
                vec![c(-h, h, -h), c(-h, h, h), c(h, h, h), c(h, h, -h)],
            ),
            wall(
                DVec3::Z,
                vec![c(-h, -h, -h), c(-h, h, -h), c(h, h, -h), c(h, -h, -h)],
            ),
            wall(
                DVec3::NEG_Z,
                vec![c(-h, -h, h), c(h, -h, h), c(h, h, h), c(-h, h, h)],
            ),
        ];
        Self { faces }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Clip by an arbitrary half-space (kept side: `plane · (p,1) ≥ 0`).
    pub fn clip_by_plane(&mut self, pl: DVec4) {
        self.clip(pl, NO_SITE);
    }

    /// Clip by the bisector between `site` and `other`, keeping the side
    /// closer to `site`. Returns true if the plane actually cut the cell.
    pub fn clip_by_bisector(&mut self, site: DVec3, other: DVec3, other_idx: u32) -> bool {
        let n = (site - other).normalize();
        let mid = 0.5 * (site + other);
        self.clip(plane(n, -n.dot(mid)), other_idx)
    }

    /// Ordered boundary ring of every face.
    #[inline]
    pub fn rings(&self) -> impl Iterator<Item = &[DVec3]> {
        self.faces.iter().map(|f| f.ring.as_slice())
    }

    /// Site indices whose bisectors still bound the cell.
    #[inline]
    pub fn bisector_sites(&self) -> impl Iterator<Item = u32> + '_ {
        self.faces
            .iter()
            .map(|f| f.source)
            .filter(|&s| s != NO_SITE)
    }

    /// True when `p` lies inside or on the cell boundary.
    pub fn contains(&self, p: DVec3) -> bool {
        !self.faces.is_empty()
            && self
                .faces
                .iter()
                .all(|f| eval_plane(f.plane, p) >= -PLANE_EPS)
    }

    /// Largest squared distance from `site` to any boundary corner.
    pub fn max_radius_squared(&self, site: DVec3) -> f64 {
        let mut max = 0.0f64;
        for face in &self.faces {
            for &p in &face.ring {
                max = max.max(p.distance_squared(site));
            }
        }
        max
    }

    fn clip(&mut self, pl: DVec4, source: u32) -> bool {
        if self.faces.is_empty() {
            return false;
        }

        let mut any_neg = false;
        let mut any_pos = false;
        for face in &self.faces {
            for &p in &face.ring {
                let d = eval_plane(pl, p);
                if d < -PLANE_EPS {
                    any_neg = true;
                } else if d > PLANE_EPS {
                    any_pos = true;
                }
            }
        }
        if !any_neg {
            // Nothing on the clipped-away side; the plane is inactive.
            return false;
        }
        if !any_pos {
            self.faces.clear();
            return true;
        }

        let mut cap: Vec<DVec3> = Vec::new();
        self.faces.retain_mut(|face| {
            clip_ring(&mut face.ring, pl, &mut cap);
            face.ring.len() >= 3
        });

        if let Some(ring) = assemble_cap_ring(pl, cap) {
            self.faces.push(CellFace {
                plane: pl,
                source,
                ring,
            });
        }
        // A bounded 3D cell needs at least four faces.
        if self.faces.len() < 4 {
            self.faces.clear();
        }
        true
    }
}

/// Sutherland-Hodgman step: keep the `d ≥ 0` part of `ring`, appending every
/// point lying on the clipping plane to `cap`.
fn clip_ring(ring: &mut Vec<DVec3>, pl: DVec4, cap: &mut Vec<DVec3>) {
    let n = ring.len();
    let dist: Vec<f64> = ring.iter().map(|&p| eval_plane(pl, p)).collect();

    let mut out: Vec<DVec3> = Vec::with_capacity(n + 2);
    let mut push = |out: &mut Vec<DVec3>, p: DVec3| {
        if out
            .last()
            .map_or(true, |q| q.distance_squared(p) > MERGE_EPS_SQ)
        {
            out.push(p);
        }
    };

    for i in 0..n {
        let j = (i + 1) % n;
        let (pi, pj) = (ring[i], ring[j]);
        let (di, dj) = (dist[i], dist[j]);

        if di >= -PLANE_EPS {
            push(&mut out, pi);
            if di.abs() <= PLANE_EPS {
                cap.push(pi);
            }
        }
        if (di > PLANE_EPS && dj < -PLANE_EPS) || (di < -PLANE_EPS && dj > PLANE_EPS) {
            let t = di / (di - dj);
            let crossing = pi + (pj - pi) * t;
            push(&mut out, crossing);
            cap.push(crossing);
        }
    }
    while out.len() > 1
        && out[0].distance_squared(*out.last().unwrap()) <= MERGE_EPS_SQ
    {
        out.pop();
    }

    *ring = out;
}

/// Order the collected crossing points into the cap face's boundary ring.
/// The cell is convex, so sorting by angle around the plane normal suffices.
fn assemble_cap_ring(pl: DVec4, mut cap: Vec<DVec3>) -> Option<Vec<DVec3>> {
    if cap.len() < 3 {
        return None;
    }
    let centroid = cap.iter().fold(DVec3::ZERO, |acc, &p| acc + p) / cap.len() as f64;
    let n = plane_normal(pl).normalize();
    let (u, w) = n.any_orthonormal_pair();

    cap.sort_by(|a, b| {
        let pa = *a - centroid;
        let pb = *b - centroid;
        let ta = pa.dot(w).atan2(pa.dot(u));
        let tb = pb.dot(w).atan2(pb.dot(u));
        ta.total_cmp(&tb)
    });

    // Every cap edge is reported by two adjacent rings; drop the duplicates.
    let mut ring: Vec<DVec3> = Vec::with_capacity(cap.len() / 2 + 2);
    for p in cap {
        if ring
            .last()
            .map_or(true, |q| q.distance_squared(p) > MERGE_EPS_SQ)
        {
            ring.push(p);
        }
    }
    while ring.len() > 1
        && ring[0].distance_squared(*ring.last().unwrap()) <= MERGE_EPS_SQ
    {
        ring.pop();
    }

    if ring.len() >= 3 {
        Some(ring)
    } else {
        None
    }
}
