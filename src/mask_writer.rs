//! Cluster label volumes
//!
//! Renders a cluster collection back onto the voxel grid, either as an
//! ordered mask (cluster n labeled n+1, so after sorting the largest cluster
//! is 1) or as a binary mask.

use crate::cluster::ClusterCollection;
use crate::error::{ClustError, Result};
use crate::grid::idx3d;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LabelMode {
    /// Cluster index + 1
    #[default]
    Ordered,
    /// 1 inside any cluster
    Binary,
}

/// Label volume for a collection.
///
/// Returns `None` when the collection is empty: there is nothing to write.
pub fn label_volume(
    clusters: &ClusterCollection,
    dims: (usize, usize, usize),
    mode: LabelMode,
) -> Result<Option<Vec<u32>>> {
    if clusters.is_empty() {
        return Ok(None);
    }
    let (nx, ny, nz) = dims;
    let mut labels = vec![0u32; nx * ny * nz];

    for (n, cluster) in clusters.iter().enumerate() {
        let label = match mode {
            LabelMode::Ordered => n as u32 + 1,
            LabelMode::Binary => 1,
        };
        for p in cluster.iter() {
            if p.i >= nx || p.j >= ny || p.k >= nz {
                return Err(ClustError::InvariantViolation(format!(
                    "cluster {} voxel ({}, {}, {}) outside {}x{}x{} grid",
                    n, p.i, p.j, p.k, nx, ny, nz
                )));
            }
            labels[idx3d(p.i, p.j, p.k, nx, ny)] = label;
        }
    }

    Ok(Some(labels))
}

/// Zero every voxel outside the labeled clusters.
///
/// `data` may hold several volumes back to back; the labels are applied to
/// each of them.
pub fn zero_outside(data: &mut [f64], labels: &[u32]) -> Result<()> {
    let n_vox = labels.len();
    if n_vox == 0 || data.len() % n_vox != 0 {
        return Err(ClustError::DimensionMismatch { expected: n_vox, got: data.len() });
    }
    for volume in data.chunks_mut(n_vox) {
        for (v, &l) in volume.iter_mut().zip(labels.iter()) {
            if l == 0 {
                *v = 0.0;
            }
        }
    }
    Ok(())
}
