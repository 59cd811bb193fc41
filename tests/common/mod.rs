//! Common test utilities for clust-core integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use clust_core::cluster::ClusterCollection;
use clust_core::grid::{idx3d, VoxelGrid};
use clust_core::nifti_io::save_nifti_to_file;

/// Deterministic linear congruential generator for synthetic grids
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    /// Uniform value in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Flat Fortran-order data with the listed voxels set
pub fn volume_with(dims: (usize, usize, usize), voxels: &[(usize, usize, usize, f64)]) -> Vec<f64> {
    let (nx, ny, nz) = dims;
    let mut data = vec![0.0; nx * ny * nz];
    for &(i, j, k, v) in voxels {
        data[idx3d(i, j, k, nx, ny)] = v;
    }
    data
}

/// Grid with the listed voxels set and everything else zero
pub fn grid_with(
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    voxels: &[(usize, usize, usize, f64)],
) -> VoxelGrid {
    VoxelGrid::from_f64(volume_with(dims, voxels), dims, voxel_size).unwrap()
}

/// Sparse random grid: each voxel is active with probability `density`,
/// with an integer value in -3..=3 excluding 0
pub fn random_grid(dims: (usize, usize, usize), density: f64, seed: u64) -> VoxelGrid {
    let mut rng = Lcg::new(seed);
    let n = dims.0 * dims.1 * dims.2;
    let data: Vec<f64> = (0..n)
        .map(|_| {
            if rng.next_f64() < density {
                let v = (rng.next_f64() * 3.0).floor() + 1.0;
                if rng.next_f64() < 0.5 { -v } else { v }
            } else {
                0.0
            }
        })
        .collect();
    VoxelGrid::from_f64(data, dims, (1.0, 1.0, 1.0)).unwrap()
}

/// Fully active block of value 1.0
pub fn block(dims: (usize, usize, usize), lo: (usize, usize, usize), hi: (usize, usize, usize)) -> Vec<f64> {
    let (nx, ny, _) = dims;
    let mut data = vec![0.0; dims.0 * dims.1 * dims.2];
    for k in lo.2..hi.2 {
        for j in lo.1..hi.1 {
            for i in lo.0..hi.0 {
                data[idx3d(i, j, k, nx, ny)] = 1.0;
            }
        }
    }
    data
}

/// Check that the clusters cover exactly the nonzero voxels of `grid`,
/// each once, with matching values
pub fn assert_partition(grid: &VoxelGrid, clusters: &ClusterCollection) {
    let (nx, ny, nz) = grid.dims();
    let mut seen = vec![false; nx * ny * nz];
    for cluster in clusters {
        assert!(!cluster.is_empty(), "empty cluster in collection");
        for p in cluster.iter() {
            let idx = idx3d(p.i, p.j, p.k, nx, ny);
            assert!(!seen[idx], "voxel ({}, {}, {}) in two clusters", p.i, p.j, p.k);
            seen[idx] = true;
            assert_eq!(p.value, grid.value(p.i, p.j, p.k));
        }
    }
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let active = grid.value(i, j, k) != 0.0;
                assert_eq!(active, seen[idx3d(i, j, k, nx, ny)], "voxel ({}, {}, {})", i, j, k);
            }
        }
    }
}

/// Size of the cluster holding each voxel (0 for inactive voxels)
pub fn cluster_size_map(clusters: &ClusterCollection, dims: (usize, usize, usize)) -> Vec<usize> {
    let (nx, ny, nz) = dims;
    let mut sizes = vec![0usize; nx * ny * nz];
    for cluster in clusters {
        for p in cluster.iter() {
            sizes[idx3d(p.i, p.j, p.k, nx, ny)] = cluster.len();
        }
    }
    sizes
}

/// Write a float NIfTI file into the temp directory
pub fn write_temp_nifti(
    name: &str,
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    let (vx, vy, vz) = voxel_size;
    let affine = [
        vx, 0.0, 0.0, 0.0,
        0.0, vy, 0.0, 0.0,
        0.0, 0.0, vz, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];
    save_nifti_to_file(&path, data, dims, voxel_size, &affine).unwrap();
    path
}
