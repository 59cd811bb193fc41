//! Voxel adjacency rules
//!
//! Two voxels are adjacent when their center-to-center distance is within
//! the connection radius `rmm`. Nearest-neighbor topologies are expressed as
//! equivalent radii over a unit-spacing grid:
//! - NN1 (faces touching, 6-connectivity): rmm = 1.11
//! - NN2 (edges touching, 18-connectivity): rmm = 1.44
//! - NN3 (corners touching, 26-connectivity): rmm = 1.77

use crate::error::{ClustError, Result};

/// Nearest-neighbor topology
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    Faces,
    Edges,
    Corners,
}

impl Connectivity {
    /// Parse the NN level (1, 2 or 3)
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Connectivity::Faces),
            2 => Some(Connectivity::Edges),
            3 => Some(Connectivity::Corners),
            _ => None,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Connectivity::Faces => 1,
            Connectivity::Edges => 2,
            Connectivity::Corners => 3,
        }
    }

    /// Radius over unit spacing that selects exactly this neighborhood
    pub fn equivalent_radius(&self) -> f64 {
        match self {
            Connectivity::Faces => 1.11,
            Connectivity::Edges => 1.44,
            Connectivity::Corners => 1.77,
        }
    }
}

/// Rule deciding whether two voxels are connected
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AdjacencyRule {
    /// Center distance <= rmm. `Radius(0.0)` means face-touching neighbors
    /// on a unit-spacing grid.
    Radius(f64),
    NearestNeighbor(Connectivity),
}

impl Default for AdjacencyRule {
    fn default() -> Self {
        AdjacencyRule::NearestNeighbor(Connectivity::Faces)
    }
}

impl AdjacencyRule {
    /// Reject negative or NaN radii before any clustering work.
    pub fn validate(&self) -> Result<()> {
        match *self {
            AdjacencyRule::Radius(rmm) if rmm.is_nan() || rmm < 0.0 => {
                Err(ClustError::InvalidRadius(rmm))
            }
            _ => Ok(()),
        }
    }

    /// Connection radius actually used for the distance test
    pub fn radius(&self) -> f64 {
        match *self {
            AdjacencyRule::Radius(rmm) if rmm == 0.0 => Connectivity::Faces.equivalent_radius(),
            AdjacencyRule::Radius(rmm) => rmm,
            AdjacencyRule::NearestNeighbor(c) => c.equivalent_radius(),
        }
    }

    /// Whether the rule is purely topological (distances in voxel units)
    pub fn forces_unit_spacing(&self) -> bool {
        match *self {
            AdjacencyRule::Radius(rmm) => rmm == 0.0,
            AdjacencyRule::NearestNeighbor(_) => true,
        }
    }

    fn effective_spacing(&self, spacing: (f64, f64, f64)) -> (f64, f64, f64) {
        if self.forces_unit_spacing() {
            (1.0, 1.0, 1.0)
        } else {
            spacing
        }
    }

    /// Adjacency test between two grid coordinates.
    ///
    /// A voxel is trivially adjacent to itself.
    pub fn is_adjacent(
        &self,
        p: (usize, usize, usize),
        q: (usize, usize, usize),
        spacing: (f64, f64, f64),
    ) -> bool {
        let (dx, dy, dz) = self.effective_spacing(spacing);
        let ddx = (p.0 as f64 - q.0 as f64) * dx;
        let ddy = (p.1 as f64 - q.1 as f64) * dy;
        let ddz = (p.2 as f64 - q.2 as f64) * dz;
        let rmm = self.radius();
        ddx * ddx + ddy * ddy + ddz * ddz <= rmm * rmm
    }

    /// Bounded neighbor window for this rule on a grid.
    ///
    /// Candidate offsets span floor(rmm/d) + 1 voxels per axis, clipped to
    /// the grid extent; the window keeps every nonzero offset that passes the
    /// same distance test as `is_adjacent`.
    pub fn neighbor_window(
        &self,
        spacing: (f64, f64, f64),
        dims: (usize, usize, usize),
    ) -> Result<NeighborWindow> {
        self.validate()?;
        let (dx, dy, dz) = self.effective_spacing(spacing);
        for d in [dx, dy, dz] {
            if !(d.is_finite() && d > 0.0) {
                return Err(ClustError::InvalidSpacing(spacing));
            }
        }

        let rmm = self.radius();
        let r2 = rmm * rmm;
        // One extra voxel: rmm/d can round just below an exact multiple
        let reach = |d: f64, n: usize| -> i32 {
            let r = (rmm / d).floor() as usize + 1;
            r.min(n.saturating_sub(1)) as i32
        };
        let (ri, rj, rk) = (reach(dx, dims.0), reach(dy, dims.1), reach(dz, dims.2));

        let mut offsets = Vec::new();
        let mut extent = (0usize, 0usize, 0usize);
        for dk in -rk..=rk {
            for dj in -rj..=rj {
                for di in -ri..=ri {
                    if di == 0 && dj == 0 && dk == 0 {
                        continue;
                    }
                    let x = di as f64 * dx;
                    let y = dj as f64 * dy;
                    let z = dk as f64 * dz;
                    if x * x + y * y + z * z <= r2 {
                        offsets.push((di, dj, dk));
                        extent.0 = extent.0.max(di.unsigned_abs() as usize);
                        extent.1 = extent.1.max(dj.unsigned_abs() as usize);
                        extent.2 = extent.2.max(dk.unsigned_abs() as usize);
                    }
                }
            }
        }

        Ok(NeighborWindow { offsets, extent })
    }
}

/// Precomputed offsets of all voxels within the connection radius
#[derive(Clone, Debug)]
pub struct NeighborWindow {
    offsets: Vec<(i32, i32, i32)>,
    extent: (usize, usize, usize),
}

impl NeighborWindow {
    pub fn offsets(&self) -> &[(i32, i32, i32)] {
        &self.offsets
    }

    /// Largest offset per axis
    pub fn extent(&self) -> (usize, usize, usize) {
        self.extent
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
