//! Error taxonomy for cluster detection
//!
//! Configuration errors are detected before clustering starts and cause the
//! affected dataset to be skipped. Invariant violations indicate a defect in
//! the clustering run itself and are never recovered from.

use std::path::PathBuf;

use crate::grid::VoxelType;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ClustError>;

#[derive(Debug, thiserror::Error)]
pub enum ClustError {
    /// Connection radius is negative or not a number.
    #[error("Illegal connection radius rmm={0}")]
    InvalidRadius(f64),

    /// Voxel spacing is zero, negative or not finite.
    #[error("Illegal voxel spacing {0:?}")]
    InvalidSpacing((f64, f64, f64)),

    /// Voxel datum cannot be clustered (complex or RGB data).
    #[error("Illegal datum type {} - complex and rgb data cannot be clustered", .0.name())]
    UnsupportedVoxelType(VoxelType),

    /// Mask voxel count differs from the dataset voxel count.
    #[error("Un-usable mask: {got} voxels, dataset has {expected}")]
    MaskSizeMismatch { expected: usize, got: usize },

    /// Data length does not match the declared grid dimensions.
    #[error("Data length {got} does not match grid size {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Orientation code is not a valid 3-letter axis code.
    #[error("Invalid orientation code '{0}'")]
    InvalidOrientation(String),

    /// Requested sub-brick is outside the dataset.
    #[error("Sub-brick index {index} out of range (dataset has {available})")]
    InvalidSubBrick { index: usize, available: usize },

    /// NIfTI parse, conversion or serialisation failure.
    #[error("{0}")]
    Nifti(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The clustering run produced an inconsistent partition.
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl ClustError {
    /// True for errors that are detected before clustering begins.
    ///
    /// A batch run skips the dataset and continues with the next one.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClustError::InvalidRadius(_)
                | ClustError::InvalidSpacing(_)
                | ClustError::UnsupportedVoxelType(_)
                | ClustError::MaskSizeMismatch { .. }
                | ClustError::DimensionMismatch { .. }
                | ClustError::InvalidOrientation(_)
                | ClustError::InvalidSubBrick { .. }
        )
    }
}
