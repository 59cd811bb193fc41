//! Connected-component cluster detection
//!
//! Partitions the active (nonzero) voxels of a grid into maximal clusters.
//! Seeds are taken in Fortran scan order (i fastest, then j, then k), so the
//! discovery order of clusters is reproducible. Each cluster is grown with a
//! worklist over a precomputed neighbor window: the cluster's own point list
//! is the frontier, and a voxel is zeroed in the working copy as soon as it
//! is claimed so it can never be claimed twice.

use std::collections::HashMap;

use crate::adjacency::AdjacencyRule;
use crate::cluster::{Cluster, ClusterCollection, ClusterPoint};
use crate::error::Result;
use crate::grid::{idx3d, VoxelGrid};

/// Which active voxels may join the same cluster
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClusterMode {
    /// Any adjacent nonzero voxels, regardless of sign or value
    #[default]
    ContiguousNonzero,
    /// Adjacent voxels with exactly equal values
    IsoValue,
    /// All voxels sharing a value, ignoring spatial adjacency
    IsoMerge,
}

/// Clustering configuration
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FinderConfig {
    pub rule: AdjacencyRule,
    pub mode: ClusterMode,
    /// Use unit voxel spacing even for a physical radius
    pub fake_spacing: bool,
}

impl FinderConfig {
    pub fn new(rule: AdjacencyRule) -> Self {
        Self { rule, ..Default::default() }
    }

    pub fn with_mode(mut self, mode: ClusterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether distances and volumes are in voxel units
    pub fn uses_unit_spacing(&self) -> bool {
        self.fake_spacing || self.rule.forces_unit_spacing()
    }
}

/// Find all clusters of active voxels.
///
/// Voxels excluded by `mask` (zero entries) are treated as inactive. An
/// empty active set yields an empty collection.
///
/// # Arguments
/// * `grid` - Voxel grid (only read)
/// * `mask` - Optional inclusion mask, one byte per voxel
/// * `config` - Adjacency rule, cluster mode and spacing override
pub fn find_clusters(
    grid: &VoxelGrid,
    mask: Option<&[u8]>,
    config: &FinderConfig,
) -> Result<ClusterCollection> {
    config.rule.validate()?;
    let mut work = grid.active_values(mask)?;
    let dims = grid.dims();

    let clusters = match config.mode {
        ClusterMode::IsoMerge => merge_by_value(&work, dims),
        ClusterMode::ContiguousNonzero | ClusterMode::IsoValue => {
            let spacing = grid.spacing(config.uses_unit_spacing());
            grow_clusters(&mut work, dims, spacing, config)?
        }
    };

    clusters.check_partition(dims)?;
    log::debug!(
        "found {} clusters ({} voxels) in {}x{}x{} grid",
        clusters.len(),
        clusters.total_points(),
        dims.0,
        dims.1,
        dims.2
    );
    Ok(clusters)
}

/// Flood-fill growth over the neighbor window
fn grow_clusters(
    work: &mut [f64],
    dims: (usize, usize, usize),
    spacing: (f64, f64, f64),
    config: &FinderConfig,
) -> Result<ClusterCollection> {
    let (nx, ny, nz) = dims;
    let window = config.rule.neighbor_window(spacing, dims)?;
    let iso = config.mode == ClusterMode::IsoValue;
    let nx_i = nx as i64;
    let ny_i = ny as i64;
    let nz_i = nz as i64;

    let mut clusters = ClusterCollection::new();

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let seed_idx = idx3d(i, j, k, nx, ny);
                let seed_val = work[seed_idx];
                if seed_val == 0.0 {
                    continue;
                }

                work[seed_idx] = 0.0;
                let mut cluster = Cluster::with_point(ClusterPoint::new(i, j, k, seed_val));

                // The cluster's point list doubles as the frontier
                let mut next = 0;
                while let Some(&p) = cluster.point(next) {
                    next += 1;
                    for &(di, dj, dk) in window.offsets() {
                        let ni = p.i as i64 + di as i64;
                        let nj = p.j as i64 + dj as i64;
                        let nk = p.k as i64 + dk as i64;
                        if ni < 0 || ni >= nx_i || nj < 0 || nj >= ny_i || nk < 0 || nk >= nz_i {
                            continue;
                        }
                        let (ni, nj, nk) = (ni as usize, nj as usize, nk as usize);
                        let n_idx = idx3d(ni, nj, nk, nx, ny);
                        let v = work[n_idx];
                        if v == 0.0 || (iso && v != seed_val) {
                            continue;
                        }
                        work[n_idx] = 0.0;
                        cluster.add_point(ClusterPoint::new(ni, nj, nk, v));
                    }
                }

                clusters.push(cluster);
            }
        }
    }

    Ok(clusters)
}

/// Group active voxels by exact value; clusters appear in order of the
/// first voxel carrying each value.
fn merge_by_value(work: &[f64], dims: (usize, usize, usize)) -> ClusterCollection {
    let (nx, ny, nz) = dims;
    let mut slots: HashMap<u64, usize> = HashMap::new();
    let mut clusters: Vec<Cluster> = Vec::new();

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let v = work[idx3d(i, j, k, nx, ny)];
                if v == 0.0 {
                    continue;
                }
                let point = ClusterPoint::new(i, j, k, v);
                match slots.get(&v.to_bits()) {
                    Some(&slot) => clusters[slot].add_point(point),
                    None => {
                        slots.insert(v.to_bits(), clusters.len());
                        clusters.push(Cluster::with_point(point));
                    }
                }
            }
        }
    }

    clusters.into_iter().collect()
}
