//! Read-only voxel grid view
//!
//! A `VoxelGrid` wraps one sub-brick of a dataset: its dimensions, voxel
//! spacing, an optional brick scale factor and the voxel values themselves.
//! Data is stored in Fortran order (x varies fastest) to match the NIfTI
//! convention: index = i + j*nx + k*nx*ny.

use crate::error::{ClustError, Result};

/// Voxel datum type of the source dataset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoxelType {
    UInt8,
    Int8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Rgb24,
    Rgba32,
}

impl VoxelType {
    /// Map a NIfTI-1 `datatype` header code
    pub fn from_nifti_code(code: i16) -> Option<Self> {
        let t = match code {
            2 => VoxelType::UInt8,
            4 => VoxelType::Int16,
            8 => VoxelType::Int32,
            16 => VoxelType::Float32,
            32 => VoxelType::Complex64,
            64 => VoxelType::Float64,
            128 => VoxelType::Rgb24,
            256 => VoxelType::Int8,
            512 => VoxelType::UInt16,
            768 => VoxelType::UInt32,
            1024 => VoxelType::Int64,
            1280 => VoxelType::UInt64,
            1792 => VoxelType::Complex128,
            2304 => VoxelType::Rgba32,
            _ => return None,
        };
        Some(t)
    }

    /// Short name used in reports
    pub fn name(&self) -> &'static str {
        match self {
            VoxelType::UInt8 => "byte",
            VoxelType::Int8 => "int8",
            VoxelType::Int16 => "short",
            VoxelType::UInt16 => "uint16",
            VoxelType::Int32 => "int",
            VoxelType::UInt32 => "uint32",
            VoxelType::Int64 => "int64",
            VoxelType::UInt64 => "uint64",
            VoxelType::Float32 => "float",
            VoxelType::Float64 => "double",
            VoxelType::Complex64 | VoxelType::Complex128 => "complex",
            VoxelType::Rgb24 => "rgb",
            VoxelType::Rgba32 => "rgba",
        }
    }

    /// Complex and RGB composites have no single real magnitude per voxel.
    pub fn is_supported(&self) -> bool {
        !matches!(
            self,
            VoxelType::Complex64 | VoxelType::Complex128 | VoxelType::Rgb24 | VoxelType::Rgba32
        )
    }
}

/// Voxel storage, one variant per storage class
#[derive(Clone, Debug, PartialEq)]
pub enum VoxelData {
    Byte(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl VoxelData {
    pub fn len(&self) -> usize {
        match self {
            VoxelData::Byte(v) => v.len(),
            VoxelData::Short(v) => v.len(),
            VoxelData::Int(v) => v.len(),
            VoxelData::Float(v) => v.len(),
            VoxelData::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw (unscaled) value at a linear index
    #[inline]
    pub fn value(&self, idx: usize) -> f64 {
        match self {
            VoxelData::Byte(v) => v[idx] as f64,
            VoxelData::Short(v) => v[idx] as f64,
            VoxelData::Int(v) => v[idx] as f64,
            VoxelData::Float(v) => v[idx] as f64,
            VoxelData::Double(v) => v[idx],
        }
    }

    pub fn voxel_type(&self) -> VoxelType {
        match self {
            VoxelData::Byte(_) => VoxelType::UInt8,
            VoxelData::Short(_) => VoxelType::Int16,
            VoxelData::Int(_) => VoxelType::Int32,
            VoxelData::Float(_) => VoxelType::Float32,
            VoxelData::Double(_) => VoxelType::Float64,
        }
    }
}

/// Convert 3D index to flat index (Fortran order)
#[inline(always)]
pub fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

/// One 3D sub-brick prepared for clustering
#[derive(Clone, Debug)]
pub struct VoxelGrid {
    data: VoxelData,
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    scale_factor: f64,
    datum: VoxelType,
}

impl VoxelGrid {
    /// Wrap voxel data with its grid geometry.
    ///
    /// Voxel sizes are stored as absolute values; the data length must equal
    /// nx*ny*nz.
    pub fn new(
        data: VoxelData,
        dims: (usize, usize, usize),
        voxel_size: (f64, f64, f64),
    ) -> Result<Self> {
        let expected = dims.0 * dims.1 * dims.2;
        if data.len() != expected {
            return Err(ClustError::DimensionMismatch { expected, got: data.len() });
        }
        let datum = data.voxel_type();
        Ok(Self {
            data,
            dims,
            voxel_size: (voxel_size.0.abs(), voxel_size.1.abs(), voxel_size.2.abs()),
            scale_factor: 1.0,
            datum,
        })
    }

    /// Convenience constructor for floating-point data
    pub fn from_f64(
        data: Vec<f64>,
        dims: (usize, usize, usize),
        voxel_size: (f64, f64, f64),
    ) -> Result<Self> {
        Self::new(VoxelData::Double(data), dims, voxel_size)
    }

    /// Set the brick intensity scale factor (0 means unscaled)
    pub fn with_scale_factor(mut self, factor: f64) -> Self {
        self.scale_factor = factor;
        self
    }

    /// Record the datum type of the dataset the values came from.
    pub fn with_datum(mut self, datum: VoxelType) -> Result<Self> {
        if !datum.is_supported() {
            return Err(ClustError::UnsupportedVoxelType(datum));
        }
        self.datum = datum;
        Ok(self)
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    pub fn n_voxels(&self) -> usize {
        self.dims.0 * self.dims.1 * self.dims.2
    }

    /// True voxel spacing in mm
    pub fn voxel_size(&self) -> (f64, f64, f64) {
        self.voxel_size
    }

    /// Spacing used for adjacency and volumes; unit spacing when `fake`
    pub fn spacing(&self, fake: bool) -> (f64, f64, f64) {
        if fake {
            (1.0, 1.0, 1.0)
        } else {
            self.voxel_size
        }
    }

    pub fn voxel_volume(&self, fake: bool) -> f64 {
        let (dx, dy, dz) = self.spacing(fake);
        dx * dy * dz
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn datum(&self) -> VoxelType {
        self.datum
    }

    pub fn data(&self) -> &VoxelData {
        &self.data
    }

    /// Raw value at grid coordinates
    #[inline]
    pub fn value(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data.value(idx3d(i, j, k, self.dims.0, self.dims.1))
    }

    /// Working copy of the values with masked-out voxels set to zero.
    ///
    /// NaN voxels are treated as inactive. A mask must have exactly one
    /// entry per voxel.
    pub fn active_values(&self, mask: Option<&[u8]>) -> Result<Vec<f64>> {
        let n_total = self.n_voxels();
        if let Some(m) = mask {
            if m.len() != n_total {
                return Err(ClustError::MaskSizeMismatch { expected: n_total, got: m.len() });
            }
        }

        let values = (0..n_total)
            .map(|idx| {
                let v = self.data.value(idx);
                let keep = mask.map_or(true, |m| m[idx] != 0);
                if keep && !v.is_nan() { v } else { 0.0 }
            })
            .collect();
        Ok(values)
    }
}
