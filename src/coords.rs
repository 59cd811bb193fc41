//! Grid index to reporting coordinates
//!
//! NIfTI world coordinates are RAS+. Reports use DICOM order (RAI: x grows
//! toward Left, y toward Posterior, z toward Superior) unless another
//! orientation code is requested, e.g. LPI for the SPM convention.

use crate::error::{ClustError, Result};

/// Maps a grid index to reporting coordinates
pub trait CoordTransform {
    fn to_xyz(&self, i: usize, j: usize, k: usize) -> [f64; 3];
}

/// Axis order and direction of reported coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Orientation {
    /// DICOM axis reported in each output slot
    axes: [usize; 3],
    /// +1 where the slot matches the DICOM direction, -1 where flipped
    signs: [i8; 3],
    code: [u8; 3],
}

impl Default for Orientation {
    fn default() -> Self {
        Self::RAI
    }
}

impl Orientation {
    pub const RAI: Orientation = Orientation { axes: [0, 1, 2], signs: [1, 1, 1], code: *b"RAI" };
    pub const LPI: Orientation = Orientation { axes: [0, 1, 2], signs: [-1, -1, 1], code: *b"LPI" };

    /// Parse a 3-letter code with one letter from each of {R,L}, {A,P}, {I,S}.
    ///
    /// The letter names the side where that coordinate is negative.
    pub fn parse(code: &str) -> Result<Self> {
        let upper = code.trim().to_ascii_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() != 3 {
            return Err(ClustError::InvalidOrientation(code.to_string()));
        }

        let mut axes = [0usize; 3];
        let mut signs = [1i8; 3];
        let mut seen = [false; 3];
        for (slot, &b) in bytes.iter().enumerate() {
            let (axis, sign) = match b {
                b'R' => (0, 1),
                b'L' => (0, -1),
                b'A' => (1, 1),
                b'P' => (1, -1),
                b'I' => (2, 1),
                b'S' => (2, -1),
                _ => return Err(ClustError::InvalidOrientation(code.to_string())),
            };
            if seen[axis] {
                return Err(ClustError::InvalidOrientation(code.to_string()));
            }
            seen[axis] = true;
            axes[slot] = axis;
            signs[slot] = sign;
        }

        Ok(Self { axes, signs, code: [bytes[0], bytes[1], bytes[2]] })
    }

    /// Three-letter code, e.g. "RAI"
    pub fn code(&self) -> &str {
        std::str::from_utf8(&self.code).unwrap_or("RAI")
    }

    /// Single-letter labels for the negative side of each output axis
    pub fn axis_labels(&self) -> [char; 3] {
        [self.code[0] as char, self.code[1] as char, self.code[2] as char]
    }

    /// Reorder DICOM (RAI) coordinates into this orientation
    pub fn from_dicom(&self, dicom: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for slot in 0..3 {
            out[slot] = self.signs[slot] as f64 * dicom[self.axes[slot]];
        }
        out
    }
}

/// Talairach (DICOM order) to MNI, reported in LPI order.
///
/// Inverse of the Brett MNI-to-Talairach approximation; the inferior half
/// is additionally stretched along z.
pub fn tta_to_mni(dicom: [f64; 3]) -> [f64; 3] {
    let tx = -dicom[0];
    let ty = -dicom[1];
    let tz = dicom[2];
    let mx = 1.01010 * tx;
    let my = 1.02962 * ty - 0.05154 * tz;
    let mut mz = 0.05434 * ty + 1.08554 * tz;
    if mz < 0.0 {
        mz *= 1.09523;
    }
    [mx, my, mz]
}

/// Affine geometry of a dataset plus the reporting convention
#[derive(Clone, Debug, PartialEq)]
pub struct GridGeometry {
    /// 4x4 index-to-RAS affine, row-major
    affine: [f64; 16],
    orientation: Orientation,
    mni: bool,
}

impl GridGeometry {
    pub fn new(affine: [f64; 16]) -> Self {
        Self { affine, orientation: Orientation::default(), mni: false }
    }

    /// Axis-aligned geometry with the given voxel sizes and zero origin
    pub fn from_voxel_size(voxel_size: (f64, f64, f64)) -> Self {
        let (vx, vy, vz) = voxel_size;
        Self::new([
            vx, 0.0, 0.0, 0.0,
            0.0, vy, 0.0, 0.0,
            0.0, 0.0, vz, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Report MNI coordinates (only meaningful for Talairach-space data)
    pub fn with_mni(mut self, mni: bool) -> Self {
        self.mni = mni;
        self
    }

    pub fn orientation(&self) -> Orientation {
        if self.mni { Orientation::LPI } else { self.orientation }
    }

    pub fn is_mni(&self) -> bool {
        self.mni
    }

    /// World (RAS+) coordinates of a voxel center
    pub fn to_ras(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        let a = &self.affine;
        let (x, y, z) = (i as f64, j as f64, k as f64);
        [
            a[0] * x + a[1] * y + a[2] * z + a[3],
            a[4] * x + a[5] * y + a[6] * z + a[7],
            a[8] * x + a[9] * y + a[10] * z + a[11],
        ]
    }
}

impl CoordTransform for GridGeometry {
    fn to_xyz(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        let ras = self.to_ras(i, j, k);
        let dicom = [-ras[0], -ras[1], ras[2]];
        if self.mni {
            tta_to_mni(dicom)
        } else {
            self.orientation.from_dicom(dicom)
        }
    }
}
