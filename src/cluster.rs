//! Cluster and cluster collection data structures
//!
//! A `Cluster` is a growable list of voxel points. A `ClusterCollection`
//! owns the clusters produced by one clustering run and supports size
//! filtering, sorting and transfer of individual clusters.

use std::cmp::Reverse;

use crate::error::{ClustError, Result};
use crate::grid::idx3d;

/// One member voxel: grid coordinates and the sampled (unscaled) value
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterPoint {
    pub i: usize,
    pub j: usize,
    pub k: usize,
    pub value: f64,
}

impl ClusterPoint {
    pub fn new(i: usize, j: usize, k: usize, value: f64) -> Self {
        Self { i, j, k, value }
    }
}

/// Connected set of voxels
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cluster {
    points: Vec<ClusterPoint>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point(point: ClusterPoint) -> Self {
        Self { points: vec![point] }
    }

    pub fn add_point(&mut self, point: ClusterPoint) {
        self.points.push(point);
    }

    /// Append all points of `other`, consuming it.
    pub fn merge(&mut self, mut other: Cluster) {
        self.points.append(&mut other.points);
    }

    /// Number of member voxels
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ClusterPoint] {
        &self.points
    }

    pub fn point(&self, n: usize) -> Option<&ClusterPoint> {
        self.points.get(n)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClusterPoint> {
        self.points.iter()
    }
}

/// Clusters found in one dataset
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterCollection {
    clusters: Vec<Cluster>,
}

impl ClusterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cluster: Cluster) {
        self.clusters.push(cluster);
    }

    /// Number of clusters
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, n: usize) -> Option<&Cluster> {
        self.clusters.get(n)
    }

    pub fn get_mut(&mut self, n: usize) -> Option<&mut Cluster> {
        self.clusters.get_mut(n)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cluster> {
        self.clusters.iter()
    }

    /// Remove and return the cluster at `n`, shifting later clusters down.
    pub fn take(&mut self, n: usize) -> Option<Cluster> {
        if n < self.clusters.len() {
            Some(self.clusters.remove(n))
        } else {
            None
        }
    }

    /// Total number of voxels over all clusters
    pub fn total_points(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }

    /// Keep clusters with at least `min_points` voxels, preserving order.
    pub fn filter_by_size(self, min_points: usize) -> Self {
        let clusters = self
            .clusters
            .into_iter()
            .filter(|c| c.len() >= min_points)
            .collect();
        Self { clusters }
    }

    /// Sort largest first; equal sizes keep discovery order.
    pub fn sort_descending_by_size(&mut self) {
        self.clusters.sort_by_key(|c| Reverse(c.len()));
    }

    /// Verify that every point lies inside the grid and that no voxel
    /// belongs to more than one cluster.
    pub fn check_partition(&self, dims: (usize, usize, usize)) -> Result<()> {
        let (nx, ny, nz) = dims;
        let mut owner: Vec<Option<usize>> = vec![None; nx * ny * nz];

        for (c, cluster) in self.clusters.iter().enumerate() {
            for p in cluster.iter() {
                if p.i >= nx || p.j >= ny || p.k >= nz {
                    return Err(ClustError::InvariantViolation(format!(
                        "cluster {} references voxel ({}, {}, {}) outside {}x{}x{} grid",
                        c, p.i, p.j, p.k, nx, ny, nz
                    )));
                }
                let idx = idx3d(p.i, p.j, p.k, nx, ny);
                if let Some(prev) = owner[idx] {
                    return Err(ClustError::InvariantViolation(format!(
                        "voxel ({}, {}, {}) assigned to clusters {} and {}",
                        p.i, p.j, p.k, prev, c
                    )));
                }
                owner[idx] = Some(c);
            }
        }
        Ok(())
    }
}

impl IntoIterator for ClusterCollection {
    type Item = Cluster;
    type IntoIter = std::vec::IntoIter<Cluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.into_iter()
    }
}

impl<'a> IntoIterator for &'a ClusterCollection {
    type Item = &'a Cluster;
    type IntoIter = std::slice::Iter<'a, Cluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}

impl FromIterator<Cluster> for ClusterCollection {
    fn from_iter<T: IntoIterator<Item = Cluster>>(iter: T) -> Self {
        Self { clusters: iter.into_iter().collect() }
    }
}

/// Minimum cluster point count for a volume threshold.
///
/// `vmul >= 0` is a volume in the units of `voxel_volume` and is converted
/// by dividing and rounding up (fractions below 0.01 voxel are dropped);
/// `vmul < 0` is taken directly as a voxel count.
pub fn min_points_for_volume(vmul: f64, voxel_volume: f64) -> usize {
    if vmul >= 0.0 {
        (vmul / voxel_volume + 0.99) as usize
    } else {
        vmul.abs() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_cluster(n: usize, j: usize) -> Cluster {
        let mut c = Cluster::new();
        for i in 0..n {
            c.add_point(ClusterPoint::new(i, j, 0, 1.0));
        }
        c
    }

    fn sample() -> ClusterCollection {
        [2usize, 5, 1, 5, 3]
            .iter()
            .enumerate()
            .map(|(j, &n)| line_cluster(n, j))
            .collect()
    }

    #[test]
    fn test_add_and_merge() {
        let mut a = Cluster::with_point(ClusterPoint::new(0, 0, 0, 1.0));
        a.add_point(ClusterPoint::new(1, 0, 0, 2.0));
        let b = line_cluster(3, 1);
        a.merge(b);
        assert_eq!(a.len(), 5);
        assert_eq!(a.point(2).unwrap().j, 1);
    }

    #[test]
    fn test_filter_by_size() {
        let filtered = sample().filter_by_size(3);
        let sizes: Vec<usize> = filtered.iter().map(Cluster::len).collect();
        assert_eq!(sizes, vec![5, 5, 3]);
        assert_eq!(filtered.clone().filter_by_size(3), filtered);
        assert!(sample().filter_by_size(6).is_empty());
        assert_eq!(sample().filter_by_size(0).len(), 5);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut c = sample();
        c.sort_descending_by_size();
        let sizes: Vec<usize> = c.iter().map(Cluster::len).collect();
        assert_eq!(sizes, vec![5, 5, 3, 2, 1]);
        // Ties keep discovery order: the 5-voxel cluster on row 1 first
        assert_eq!(c.get(0).unwrap().point(0).unwrap().j, 1);
        assert_eq!(c.get(1).unwrap().point(0).unwrap().j, 3);

        let once = c.clone();
        c.sort_descending_by_size();
        assert_eq!(c, once);
    }

    #[test]
    fn test_take_transfers_ownership() {
        let mut c = sample();
        let taken = c.take(1).unwrap();
        assert_eq!(taken.len(), 5);
        assert_eq!(c.len(), 4);
        assert_eq!(c.get(1).unwrap().len(), 1);
        assert!(c.take(10).is_none());
    }

    #[test]
    fn test_check_partition() {
        let c = sample();
        assert!(c.check_partition((10, 5, 1)).is_ok());
        assert_eq!(c.total_points(), 16);

        let mut dup = sample();
        dup.push(Cluster::with_point(ClusterPoint::new(0, 0, 0, 1.0)));
        assert!(matches!(dup.check_partition((10, 5, 1)), Err(ClustError::InvariantViolation(_))));

        // Row 4 does not exist in a 4-row grid
        assert!(sample().check_partition((10, 4, 1)).is_err());
    }

    #[test]
    fn test_min_points_for_volume() {
        // 2x2x2 mm voxels (8 microliters)
        assert_eq!(min_points_for_volume(0.0, 8.0), 0);
        assert_eq!(min_points_for_volume(64.0, 8.0), 8);
        assert_eq!(min_points_for_volume(65.0, 8.0), 9);
        assert_eq!(min_points_for_volume(-20.0, 8.0), 20);
        assert_eq!(min_points_for_volume(2.0, 1.0), 2);
    }
}
