//! Per-cluster and global cluster statistics
//!
//! For each cluster: centroid weighted by |value|, bounding extrema, mean,
//! standard error of the mean, the value of largest magnitude with its
//! location, and volume. The global row pools the raw sums of all reported
//! clusters and derives mean and SEM exactly as for one cluster of the
//! combined size.
//!
//! Mean convention: the mean (and the SEM around it) uses either the signed
//! values or their absolute values. Both sums are accumulated, so both means
//! are always available.

use crate::cluster::{Cluster, ClusterCollection};
use crate::coords::CoordTransform;

/// Statistics configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatsConfig {
    /// Report the signed mean instead of the mean of |value|
    pub signed_mean: bool,
    /// Brick intensity scale factor; 0 leaves values unscaled
    pub scale_factor: f64,
    /// Volume of one voxel (1.0 when reporting voxel counts)
    pub voxel_volume: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { signed_mean: false, scale_factor: 0.0, voxel_volume: 1.0 }
    }
}

impl StatsConfig {
    fn scale(&self) -> f64 {
        if self.scale_factor != 0.0 { self.scale_factor } else { 1.0 }
    }
}

/// Raw sums over a set of voxels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Accumulator {
    pub n: usize,
    /// Sum of signed values
    pub signed_sum: f64,
    /// Sum of absolute values
    pub abs_sum: f64,
    /// Sum of squared values
    pub sq_sum: f64,
    /// |value|-weighted position sums
    pub weighted_pos: [f64; 3],
}

impl Accumulator {
    pub fn add(&mut self, value: f64, xyz: [f64; 3]) {
        let mag = value.abs();
        self.n += 1;
        self.signed_sum += value;
        self.abs_sum += mag;
        self.sq_sum += mag * mag;
        for a in 0..3 {
            self.weighted_pos[a] += mag * xyz[a];
        }
    }

    /// Pool another accumulator's sums into this one
    pub fn absorb(&mut self, other: &Accumulator) {
        self.n += other.n;
        self.signed_sum += other.signed_sum;
        self.abs_sum += other.abs_sum;
        self.sq_sum += other.sq_sum;
        for a in 0..3 {
            self.weighted_pos[a] += other.weighted_pos[a];
        }
    }

    /// A zero absolute sum leaves the |v| weights undefined and always marks
    /// a cluster degenerate. With signed means, a zero signed sum is skipped
    /// as well, which is stricter than the weights require: a cluster such as
    /// {3, -1, -2} has a well defined centroid but is still dropped.
    pub fn is_degenerate(&self, signed_mean: bool) -> bool {
        self.abs_sum == 0.0 || (signed_mean && self.signed_sum == 0.0)
    }

    /// Centroid weighted by |value|
    pub fn centroid(&self) -> [f64; 3] {
        let w = self.abs_sum;
        [self.weighted_pos[0] / w, self.weighted_pos[1] / w, self.weighted_pos[2] / w]
    }

    /// Scaled (signed mean, absolute mean)
    pub fn means(&self, scale: f64) -> (f64, f64) {
        let n = self.n as f64;
        (self.signed_sum / n * scale, self.abs_sum / n * scale)
    }

    /// Standard error of `mean` (already scaled); sums are scaled here.
    pub fn sem(&self, mean: f64, scale: f64) -> f64 {
        if self.n <= 1 {
            return 0.0;
        }
        let n = self.n as f64;
        let sq_sum = self.sq_sum * scale * scale;
        let var = (sq_sum - n * mean * mean) / (n - 1.0);
        if var > 0.0 { (var / n).sqrt() } else { 0.0 }
    }
}

/// Statistics of one reported cluster
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterStats {
    /// Position in the (sorted) collection
    pub index: usize,
    pub n_points: usize,
    pub volume: f64,
    pub centroid: [f64; 3],
    pub min: [f64; 3],
    pub max: [f64; 3],
    /// Mean in the configured convention
    pub mean: f64,
    pub signed_mean: f64,
    pub abs_mean: f64,
    pub sem: f64,
    /// Signed value of the largest-magnitude voxel
    pub max_value: f64,
    pub max_location: [f64; 3],
}

/// Pooled statistics over all reported clusters
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalStats {
    pub n_clusters: usize,
    pub n_points: usize,
    pub volume: f64,
    pub centroid: [f64; 3],
    pub mean: f64,
    pub sem: f64,
}

/// Statistics for a whole collection
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterReport {
    pub clusters: Vec<ClusterStats>,
    /// Indices of clusters skipped because their weights cancel
    pub degenerate: Vec<usize>,
    /// None when no cluster was reported
    pub global: Option<GlobalStats>,
}

impl ClusterReport {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Sums and extrema of one cluster in reporting coordinates
struct ClusterScan {
    acc: Accumulator,
    min: [f64; 3],
    max: [f64; 3],
    peak: f64,
    peak_value: f64,
    peak_location: [f64; 3],
}

fn scan_cluster<T: CoordTransform + ?Sized>(cluster: &Cluster, transform: &T) -> ClusterScan {
    let mut scan = ClusterScan {
        acc: Accumulator::default(),
        min: [f64::INFINITY; 3],
        max: [f64::NEG_INFINITY; 3],
        peak: 0.0,
        peak_value: 0.0,
        peak_location: [0.0; 3],
    };

    for p in cluster.iter() {
        let xyz = transform.to_xyz(p.i, p.j, p.k);
        scan.acc.add(p.value, xyz);

        let mag = p.value.abs();
        if mag > scan.peak {
            scan.peak = mag;
            scan.peak_value = p.value;
            scan.peak_location = xyz;
        }
        for a in 0..3 {
            scan.min[a] = scan.min[a].min(xyz[a]);
            scan.max[a] = scan.max[a].max(xyz[a]);
        }
    }
    scan
}

/// Compute statistics for every cluster of a collection.
///
/// Clusters are reported in collection order; degenerate clusters are
/// listed separately and do not contribute to the global statistics.
pub fn cluster_statistics<T: CoordTransform + ?Sized>(
    clusters: &ClusterCollection,
    transform: &T,
    config: &StatsConfig,
) -> ClusterReport {
    let scale = config.scale();
    let mut report = ClusterReport::default();
    let mut pooled = Accumulator::default();

    for (index, cluster) in clusters.iter().enumerate() {
        if cluster.is_empty() {
            continue;
        }
        let scan = scan_cluster(cluster, transform);
        if scan.acc.is_degenerate(config.signed_mean) {
            report.degenerate.push(index);
            continue;
        }
        pooled.absorb(&scan.acc);

        let (signed_mean, abs_mean) = scan.acc.means(scale);
        let mean = if config.signed_mean { signed_mean } else { abs_mean };

        report.clusters.push(ClusterStats {
            index,
            n_points: cluster.len(),
            volume: cluster.len() as f64 * config.voxel_volume,
            centroid: scan.acc.centroid(),
            min: scan.min,
            max: scan.max,
            mean,
            signed_mean,
            abs_mean,
            sem: scan.acc.sem(mean, scale),
            max_value: scan.peak_value * scale,
            max_location: scan.peak_location,
        });
    }

    if !report.clusters.is_empty() {
        let (signed_mean, abs_mean) = pooled.means(scale);
        let mean = if config.signed_mean { signed_mean } else { abs_mean };
        report.global = Some(GlobalStats {
            n_clusters: report.clusters.len(),
            n_points: pooled.n,
            volume: pooled.n as f64 * config.voxel_volume,
            centroid: pooled.centroid(),
            mean,
            sem: pooled.sem(mean, scale),
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterPoint;

    /// Coordinates equal to grid indices
    struct Identity;

    impl CoordTransform for Identity {
        fn to_xyz(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
            [i as f64, j as f64, k as f64]
        }
    }

    fn collection(points: &[&[(usize, usize, usize, f64)]]) -> ClusterCollection {
        points
            .iter()
            .map(|pts| {
                let mut c = Cluster::new();
                for &(i, j, k, v) in pts.iter() {
                    c.add_point(ClusterPoint::new(i, j, k, v));
                }
                c
            })
            .collect()
    }

    #[test]
    fn test_two_voxel_centroid() {
        let c = collection(&[&[(0, 0, 0, 1.0), (4, 2, 0, 3.0)]]);
        let r = cluster_statistics(&c, &Identity, &StatsConfig::default());
        let s = &r.clusters[0];
        // (1*0 + 3*4)/4, (1*0 + 3*2)/4
        assert_eq!(s.centroid, [3.0, 1.5, 0.0]);
        assert_eq!(s.min, [0.0, 0.0, 0.0]);
        assert_eq!(s.max, [4.0, 2.0, 0.0]);
        assert_eq!(s.max_value, 3.0);
        assert_eq!(s.max_location, [4.0, 2.0, 0.0]);
    }

    #[test]
    fn test_centroid_uses_absolute_weights() {
        let c = collection(&[&[(0, 0, 0, -3.0), (4, 0, 0, 1.0)]]);
        let cfg = StatsConfig { signed_mean: true, ..Default::default() };
        let s = &cluster_statistics(&c, &Identity, &cfg).clusters[0];
        assert_eq!(s.centroid, [1.0, 0.0, 0.0]);
        assert_eq!(s.mean, -1.0);
        assert_eq!(s.abs_mean, 2.0);
        assert_eq!(s.max_value, -3.0);
    }

    #[test]
    fn test_sem_boundaries() {
        let c = collection(&[&[(0, 0, 0, 4.0)], &[(2, 0, 0, 2.5), (3, 0, 0, 2.5)]]);
        let r = cluster_statistics(&c, &Identity, &StatsConfig::default());
        assert_eq!(r.clusters[0].sem, 0.0);
        assert_eq!(r.clusters[1].sem, 0.0);
        assert_eq!(r.clusters[1].mean, 2.5);
    }

    #[test]
    fn test_sem_value() {
        // Values 1,2,3: sample variance 1, SEM = sqrt(1/3)
        let c = collection(&[&[(0, 0, 0, 1.0), (1, 0, 0, 2.0), (2, 0, 0, 3.0)]]);
        let s = &cluster_statistics(&c, &Identity, &StatsConfig::default()).clusters[0];
        assert!((s.sem - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_scale_factor_applied() {
        let c = collection(&[&[(0, 0, 0, 1.0), (1, 0, 0, 2.0), (2, 0, 0, 3.0)]]);
        let cfg = StatsConfig { scale_factor: 0.5, ..Default::default() };
        let s = &cluster_statistics(&c, &Identity, &cfg).clusters[0];
        assert_eq!(s.mean, 1.0);
        assert_eq!(s.max_value, 1.5);
        // SEM scales linearly with the factor
        assert!((s.sem - 0.5 * (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
        // Centroid is unaffected
        assert_eq!(s.centroid[0], (0.0 + 2.0 + 6.0) / 6.0);
    }

    #[test]
    fn test_degenerate_signed_cluster() {
        let c = collection(&[&[(0, 0, 0, 5.0), (1, 0, 0, -5.0)]]);

        let signed = StatsConfig { signed_mean: true, ..Default::default() };
        let r = cluster_statistics(&c, &Identity, &signed);
        assert!(r.clusters.is_empty());
        assert_eq!(r.degenerate, vec![0]);
        assert!(r.global.is_none());

        let r = cluster_statistics(&c, &Identity, &StatsConfig::default());
        assert!(r.degenerate.is_empty());
        let s = &r.clusters[0];
        assert_eq!(s.n_points, 2);
        assert_eq!(s.signed_mean, 0.0);
        assert_eq!(s.abs_mean, 5.0);
        assert_eq!(s.mean, 5.0);
    }

    #[test]
    fn test_signed_cancellation_skipped_only_in_signed_mode() {
        let c = collection(&[&[(0, 0, 0, 3.0), (1, 0, 0, -1.0), (2, 0, 0, -2.0)]]);

        let signed = StatsConfig { signed_mean: true, ..Default::default() };
        let r = cluster_statistics(&c, &Identity, &signed);
        assert_eq!(r.degenerate, vec![0]);
        assert!(r.clusters.is_empty());

        let r = cluster_statistics(&c, &Identity, &StatsConfig::default());
        assert!(r.degenerate.is_empty());
        let s = &r.clusters[0];
        assert_eq!(s.signed_mean, 0.0);
        assert_eq!(s.abs_mean, 2.0);
        // |v| weights: (0*3 + 1*1 + 2*2) / 6
        assert!((s.centroid[0] - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_global_pools_sums() {
        // Cluster means 1 (n=1) and 4 (n=3): pooled mean 13/4, not 2.5
        let c = collection(&[
            &[(0, 0, 0, 1.0)],
            &[(5, 0, 0, 4.0), (6, 0, 0, 4.0), (7, 0, 0, 4.0)],
        ]);
        let cfg = StatsConfig { voxel_volume: 8.0, ..Default::default() };
        let r = cluster_statistics(&c, &Identity, &cfg);
        let g = r.global.unwrap();
        assert_eq!(g.n_clusters, 2);
        assert_eq!(g.n_points, 4);
        assert_eq!(g.volume, 32.0);
        assert_eq!(g.mean, 13.0 / 4.0);
        // Sum of squares 49, n=4: var = (49 - 4*(13/4)^2)/3 = 2.25
        assert!((g.sem - (2.25f64 / 4.0).sqrt()).abs() < 1e-12);
        // Weighted x: (1*0 + 4*5 + 4*6 + 4*7)/13
        assert!((g.centroid[0] - 72.0 / 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_volume_uses_voxel_volume() {
        let c = collection(&[&[(0, 0, 0, 1.0), (1, 0, 0, 1.0)]]);
        let cfg = StatsConfig { voxel_volume: 27.0, ..Default::default() };
        assert_eq!(cluster_statistics(&c, &Identity, &cfg).clusters[0].volume, 54.0);
    }

    #[test]
    fn test_negative_variance_clamped() {
        let mut acc = Accumulator::default();
        for _ in 0..3 {
            acc.add(0.1, [0.0; 3]);
        }
        // Cancellation can leave a tiny negative variance
        assert_eq!(acc.sem(0.1 + 1e-12, 1.0), 0.0);
    }
}
