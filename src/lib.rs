//! Clust-Core: connected-component clustering of 3D activation maps
//!
//! This crate groups the nonzero voxels of a 3D volume into spatially
//! connected clusters and reports their size, centroid, extent and intensity
//! statistics.
//!
//! # Modules
//! - `grid`: Voxel grid view, datum types, masking
//! - `adjacency`: Radius and nearest-neighbor (NN1/NN2/NN3) adjacency
//! - `cluster`: Clusters and cluster collections
//! - `finder`: Cluster detection (flood fill over a neighbor window)
//! - `stats`: Per-cluster and pooled statistics
//! - `coords`: Grid index to reporting coordinates (orientation, TT to MNI)
//! - `mask_writer`: Cluster label volumes
//! - `edit`: Voxel clipping and thresholding before clustering
//! - `nifti_io`: NIfTI-1 input and output
//! - `report`: Text cluster reports
//! - `pipeline`: Run options, per-dataset runs, parallel batches

// Core modules
pub mod error;
pub mod grid;
pub mod adjacency;
pub mod cluster;
pub mod finder;

// Reporting
pub mod stats;
pub mod coords;
pub mod report;
pub mod mask_writer;

// Preprocessing
pub mod edit;

// I/O modules
pub mod nifti_io;

pub mod pipeline;

pub use error::{ClustError, Result};
