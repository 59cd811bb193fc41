//! Per-dataset clustering runs
//!
//! One dataset goes through: sub-brick selection and edits, optional mask,
//! cluster search, size filter, sort, statistics. Independent datasets are
//! processed in parallel with rayon; results come back in input order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::adjacency::{AdjacencyRule, Connectivity};
use crate::cluster::{min_points_for_volume, ClusterCollection};
use crate::coords::{GridGeometry, Orientation};
use crate::edit::{apply_edits, EditParams};
use crate::error::Result;
use crate::finder::{find_clusters, FinderConfig};
use crate::grid::VoxelGrid;
use crate::mask_writer::{label_volume, zero_outside, LabelMode};
use crate::nifti_io::{read_nifti_file, save_nifti_to_file};
use crate::report::{render_report, ReportBody, ReportHeader, ReportStyle};
use crate::stats::{cluster_statistics, ClusterReport, StatsConfig};

/// Files written from the clusters of the first dataset
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputOptions {
    /// Copy of the input with voxels outside clusters zeroed
    pub prefix: Option<PathBuf>,
    /// Cluster label volume
    pub savemask: Option<PathBuf>,
    pub label_mode: LabelMode,
}

impl OutputOptions {
    pub fn is_empty(&self) -> bool {
        self.prefix.is_none() && self.savemask.is_none()
    }
}

/// Everything that controls a clustering run
#[derive(Clone, Debug, PartialEq)]
pub struct ClustOptions {
    pub finder: FinderConfig,
    /// Minimum cluster volume (>= 0), or minus a voxel count (< 0)
    pub vmul: f64,
    /// Mean and SEM from signed values instead of magnitudes
    pub signed_mean: bool,
    pub edit: EditParams,
    /// Volume holding the values to cluster
    pub data_index: usize,
    /// Volume holding the threshold values
    pub thresh_index: Option<usize>,
    pub orientation: Orientation,
    pub mni: bool,
    /// Inclusion mask, one byte per voxel
    pub mask: Option<Vec<u8>>,
    pub style: ReportStyle,
    pub outputs: OutputOptions,
}

impl Default for ClustOptions {
    fn default() -> Self {
        Self::nearest_neighbor(Connectivity::Faces, 0)
    }
}

impl ClustOptions {
    /// Physical radius in mm and minimum volume in microliters.
    ///
    /// A radius of 0 means face neighbors with unit voxel spacing.
    pub fn from_radius(rmm: f64, vmul: f64) -> Self {
        Self {
            finder: FinderConfig::new(AdjacencyRule::Radius(rmm)),
            vmul,
            signed_mean: false,
            edit: EditParams::default(),
            data_index: 0,
            thresh_index: None,
            orientation: Orientation::default(),
            mni: false,
            mask: None,
            style: ReportStyle::default(),
            outputs: OutputOptions::default(),
        }
    }

    /// Nearest-neighbor connectivity with a minimum size in voxels.
    ///
    /// A minimum of 0 means 2 voxels.
    pub fn nearest_neighbor(connectivity: Connectivity, min_voxels: usize) -> Self {
        let vmul = if min_voxels == 0 { 2.0 } else { min_voxels as f64 };
        let mut opts = Self::from_radius(0.0, vmul);
        opts.finder = FinderConfig::new(AdjacencyRule::NearestNeighbor(connectivity));
        opts
    }

    /// Minimum point count for a grid
    pub fn min_points(&self, grid: &VoxelGrid) -> usize {
        min_points_for_volume(self.vmul, grid.voxel_volume(self.finder.uses_unit_spacing()))
    }

    fn stats_config(&self, grid: &VoxelGrid) -> StatsConfig {
        StatsConfig {
            signed_mean: self.signed_mean,
            scale_factor: grid.scale_factor(),
            voxel_volume: grid.voxel_volume(self.finder.uses_unit_spacing()),
        }
    }
}

/// Result of clustering one dataset
#[derive(Clone, Debug, PartialEq)]
pub enum ClusterResult {
    /// No active voxels
    NoClusters,
    /// Every cluster was smaller than the minimum size
    NoneAboveThreshold { found: usize },
    Found {
        /// Retained clusters, largest first
        clusters: ClusterCollection,
        report: ClusterReport,
        /// Clusters dropped by the size filter
        dropped: usize,
    },
}

/// One dataset's clusters plus what is needed to print its report
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetOutcome {
    pub header: ReportHeader,
    pub result: ClusterResult,
}

impl DatasetOutcome {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.header.source = source.into();
        self
    }

    pub fn clusters(&self) -> Option<&ClusterCollection> {
        match &self.result {
            ClusterResult::Found { clusters, .. } => Some(clusters),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&ClusterReport> {
        match &self.result {
            ClusterResult::Found { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn render(&self, style: &ReportStyle) -> String {
        let body = match &self.result {
            ClusterResult::NoClusters | ClusterResult::NoneAboveThreshold { .. } => ReportBody::NoClusters,
            ClusterResult::Found { report, .. } => ReportBody::Clusters(report),
        };
        render_report(&self.header, body, style)
    }
}

/// Cluster one grid.
///
/// # Arguments
/// * `grid` - Values to cluster, already edited
/// * `geometry` - Index to reporting coordinates
/// * `mask` - Optional inclusion mask
/// * `opts` - Run options
pub fn run_grid(
    grid: &VoxelGrid,
    geometry: &GridGeometry,
    mask: Option<&[u8]>,
    opts: &ClustOptions,
) -> Result<DatasetOutcome> {
    let min_points = opts.min_points(grid);
    let header = ReportHeader {
        source: String::new(),
        mni: geometry.is_mni() || opts.mni,
        radius: opts.finder.rule.radius(),
        min_points,
        voxel_size: grid.voxel_size(),
        fake_spacing: opts.finder.uses_unit_spacing(),
        datum: grid.datum(),
        orientation: geometry.orientation(),
        mask_voxels: mask.map(|m| m.iter().filter(|&&b| b != 0).count()),
        signed_mean: opts.signed_mean,
    };

    let clusters = find_clusters(grid, mask, &opts.finder)?;
    if clusters.is_empty() {
        return Ok(DatasetOutcome { header, result: ClusterResult::NoClusters });
    }

    let found = clusters.len();
    let mut clusters = clusters.filter_by_size(min_points);
    if clusters.is_empty() {
        log::debug!("all {} clusters smaller than {} voxels", found, min_points);
        return Ok(DatasetOutcome { header, result: ClusterResult::NoneAboveThreshold { found } });
    }
    let dropped = found - clusters.len();
    clusters.sort_descending_by_size();

    let report = cluster_statistics(&clusters, geometry, &opts.stats_config(grid));
    if !report.degenerate.is_empty() {
        log::debug!("skipped {} clusters with zero weight", report.degenerate.len());
    }
    log::info!(
        "{} clusters kept ({} dropped below {} voxels), {} reported",
        clusters.len(),
        dropped,
        min_points,
        report.clusters.len()
    );

    Ok(DatasetOutcome { header, result: ClusterResult::Found { clusters, report, dropped } })
}

/// Load a mask file: nonzero voxels of the first volume are kept
pub fn load_mask_file(path: &Path) -> Result<Vec<u8>> {
    let nifti = read_nifti_file(path)?;
    Ok(nifti.volume(0)?.iter().map(|&v| u8::from(v != 0.0)).collect())
}

/// Load, edit and cluster one NIfTI dataset.
pub fn run_file(path: &Path, opts: &ClustOptions) -> Result<DatasetOutcome> {
    let nifti = read_nifti_file(path)?;

    let mut data = nifti.volume(opts.data_index)?.to_vec();
    let thresh = opts.thresh_index.map(|t| nifti.volume(t)).transpose()?;
    if !opts.edit.is_noop() {
        let active = apply_edits(&mut data, thresh, &opts.edit)?;
        log::debug!("{} voxels left after edits in {}", active, path.display());
    }

    let grid = nifti.to_grid(data)?;
    let orientation = if opts.mni { Orientation::LPI } else { opts.orientation };
    if opts.mni && !nifti.is_talairach() {
        log::warn!("{} is not in Talairach space; reporting LPI coordinates without conversion", path.display());
    }
    let geometry = GridGeometry::new(nifti.affine)
        .with_orientation(orientation)
        .with_mni(opts.mni && nifti.is_talairach());

    let outcome = run_grid(&grid, &geometry, opts.mask.as_deref(), opts)?;
    Ok(outcome.with_source(path.display().to_string()))
}

/// Cluster several datasets in parallel.
///
/// A failure only affects its own entry.
pub fn run_batch(paths: &[PathBuf], opts: &ClustOptions) -> Vec<Result<DatasetOutcome>> {
    paths.par_iter().map(|p| run_file(p, opts)).collect()
}

/// Write the label volume and/or masked copy for one dataset.
///
/// Nothing is written when the dataset has no clusters.
pub fn write_outputs(input: &Path, outcome: &DatasetOutcome, opts: &ClustOptions) -> Result<()> {
    let out = &opts.outputs;
    if out.is_empty() {
        return Ok(());
    }
    let Some(clusters) = outcome.clusters() else {
        log::warn!("no clusters in {}; output volumes not written", input.display());
        return Ok(());
    };

    let nifti = read_nifti_file(input)?;
    let Some(labels) = label_volume(clusters, nifti.dims, out.label_mode)? else {
        return Ok(());
    };

    if let Some(path) = &out.savemask {
        let values: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
        save_nifti_to_file(path, &values, nifti.dims, nifti.voxel_size, &nifti.affine)?;
        log::info!("wrote cluster mask {}", path.display());
    }

    if let Some(path) = &out.prefix {
        let mut data = nifti.data;
        zero_outside(&mut data, &labels)?;
        save_nifti_to_file(path, &data, nifti.dims, nifti.voxel_size, &nifti.affine)?;
        log::info!("wrote clustered copy {}", path.display());
    }
    Ok(())
}

/// Write outputs for the first dataset of a batch; later datasets only warn.
pub fn write_batch_outputs(
    paths: &[PathBuf],
    outcomes: &[Result<DatasetOutcome>],
    opts: &ClustOptions,
) -> Result<()> {
    if opts.outputs.is_empty() {
        return Ok(());
    }
    for (n, (path, outcome)) in paths.iter().zip(outcomes.iter()).enumerate() {
        if n > 0 {
            log::warn!("output volume not written for {}: only the first dataset is saved", path.display());
            continue;
        }
        if let Ok(outcome) = outcome {
            write_outputs(path, outcome, opts)?;
        }
    }
    Ok(())
}
