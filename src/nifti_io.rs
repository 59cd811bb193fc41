//! NIfTI file I/O
//!
//! Loads datasets (all volumes, Fortran order) from .nii / .nii.gz bytes or
//! files, and writes float32 NIfTI-1 volumes for cluster masks and masked
//! copies of the input.

use std::io::Cursor;
use std::path::Path;

use flate2::read::GzDecoder;
use ndarray::Array;
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};

use crate::error::{ClustError, Result};
use crate::grid::{VoxelData, VoxelGrid, VoxelType};

/// NIFTI_XFORM_TALAIRACH
const XFORM_TALAIRACH: i16 = 3;

/// NIfTI data loaded from bytes
#[derive(Clone, Debug)]
pub struct NiftiData {
    /// All volumes back to back, each in Fortran order
    pub data: Vec<f64>,
    /// Spatial dimensions (nx, ny, nz)
    pub dims: (usize, usize, usize),
    /// Number of volumes (sub-bricks)
    pub n_vols: usize,
    /// Voxel sizes in mm
    pub voxel_size: (f64, f64, f64),
    /// Affine transformation matrix (4x4, row-major)
    pub affine: [f64; 16],
    /// Data scaling slope (already applied to `data`)
    pub scl_slope: f64,
    /// Data scaling intercept (already applied to `data`)
    pub scl_inter: f64,
    /// Header datatype code
    pub datatype: i16,
    /// sform code, or qform code when no sform is set
    pub xform_code: i16,
}

impl NiftiData {
    pub fn n_voxels(&self) -> usize {
        self.dims.0 * self.dims.1 * self.dims.2
    }

    /// One volume of the dataset
    pub fn volume(&self, index: usize) -> Result<&[f64]> {
        if index >= self.n_vols {
            return Err(ClustError::InvalidSubBrick { index, available: self.n_vols });
        }
        let n = self.n_voxels();
        Ok(&self.data[index * n..(index + 1) * n])
    }

    pub fn voxel_type(&self) -> Result<VoxelType> {
        check_datatype(self.datatype)
    }

    /// Coordinates are in Talairach space
    pub fn is_talairach(&self) -> bool {
        self.xform_code == XFORM_TALAIRACH
    }

    /// Build a clustering grid from already edited values of this dataset.
    ///
    /// Integer datasets keep their stored type: values are divided back by
    /// `scl_slope`, which becomes the grid scale factor. A nonzero
    /// `scl_inter`, or values that no longer fit the stored type, fall back
    /// to double storage with scale factor 1.
    pub fn to_grid(&self, values: Vec<f64>) -> Result<VoxelGrid> {
        let datum = self.voxel_type()?;
        let (data, factor) = match typed_data(&values, datum, self.scl_slope, self.scl_inter) {
            Some(data) => (data, self.scl_slope),
            None => (VoxelData::Double(values), 1.0),
        };
        VoxelGrid::new(data, self.dims, self.voxel_size)?
            .with_scale_factor(factor)
            .with_datum(datum)
    }
}

/// Stored-type voxel data for scaled values, if every value maps back exactly
fn typed_data(values: &[f64], datum: VoxelType, slope: f64, inter: f64) -> Option<VoxelData> {
    if inter != 0.0 {
        return None;
    }
    match datum {
        VoxelType::Float32 if slope == 1.0 => {
            Some(VoxelData::Float(values.iter().map(|&v| v as f32).collect()))
        }
        VoxelType::UInt8 => raw_integers(values, slope, 0.0, u8::MAX as f64)
            .map(|raw| VoxelData::Byte(raw.into_iter().map(|r| r as u8).collect())),
        VoxelType::Int8 | VoxelType::Int16 => {
            raw_integers(values, slope, i16::MIN as f64, i16::MAX as f64)
                .map(|raw| VoxelData::Short(raw.into_iter().map(|r| r as i16).collect()))
        }
        VoxelType::UInt16 | VoxelType::Int32 => {
            raw_integers(values, slope, i32::MIN as f64, i32::MAX as f64)
                .map(|raw| VoxelData::Int(raw.into_iter().map(|r| r as i32).collect()))
        }
        _ => None,
    }
}

/// Unscaled integer values within [lo, hi], or None if any value is off
fn raw_integers(values: &[f64], slope: f64, lo: f64, hi: f64) -> Option<Vec<f64>> {
    values
        .iter()
        .map(|&v| {
            let raw = v / slope;
            let r = raw.round();
            let exact = (raw - r).abs() <= 1e-6 * r.abs().max(1.0);
            (exact && r >= lo && r <= hi).then_some(r)
        })
        .collect()
}

/// Map a header datatype, rejecting types that cannot be clustered
pub fn check_datatype(code: i16) -> Result<VoxelType> {
    let t = VoxelType::from_nifti_code(code)
        .ok_or_else(|| ClustError::Nifti(format!("Unknown NIfTI datatype {}", code)))?;
    if !t.is_supported() {
        return Err(ClustError::UnsupportedVoxelType(t));
    }
    Ok(t)
}

/// Check if bytes are gzip compressed
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Get header info for diagnostics
fn get_header_info(bytes: &[u8]) -> String {
    if bytes.len() < 348 {
        return format!("File too small ({} bytes, need at least 348)", bytes.len());
    }

    let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magic = String::from_utf8_lossy(&bytes[344..348]).to_string();
    let datatype = i16::from_le_bytes([bytes[70], bytes[71]]);

    format!("sizeof_hdr={}, magic='{}', datatype={}", sizeof_hdr, magic, datatype)
}

fn read_object(bytes: &[u8]) -> Result<InMemNiftiObject> {
    if is_gzip(bytes) {
        let decoder = GzDecoder::new(Cursor::new(bytes));
        InMemNiftiObject::from_reader(decoder).map_err(|e| {
            let mut decoder2 = GzDecoder::new(Cursor::new(bytes));
            let mut decompressed = Vec::new();
            let info = if std::io::Read::read_to_end(&mut decoder2, &mut decompressed).is_ok() {
                get_header_info(&decompressed)
            } else {
                "Could not decompress".to_string()
            };
            ClustError::Nifti(format!("Failed to read gzipped NIfTI: {} ({})", e, info))
        })
    } else {
        let info = get_header_info(bytes);
        InMemNiftiObject::from_reader(Cursor::new(bytes))
            .map_err(|e| ClustError::Nifti(format!("Failed to read NIfTI: {} ({})", e, info)))
    }
}

/// Load a NIfTI file from bytes
///
/// Supports both .nii and .nii.gz files (gzip is auto-detected). Every
/// volume of a 4D file is loaded.
pub fn load_nifti(bytes: &[u8]) -> Result<NiftiData> {
    let obj = read_object(bytes)?;
    let header = obj.header();

    let ndim = header.dim[0] as usize;
    if ndim < 3 {
        return Err(ClustError::Nifti(format!("Expected at least 3D volume, got {}D", ndim)));
    }

    // Complex and RGB data never reach the ndarray conversion
    check_datatype(header.datatype)?;
    let datatype = header.datatype;

    let pixdim = header.pixdim;
    let voxel_size = (pixdim[1].abs() as f64, pixdim[2].abs() as f64, pixdim[3].abs() as f64);

    let scl_slope = if header.scl_slope == 0.0 { 1.0 } else { header.scl_slope as f64 };
    let scl_inter = header.scl_inter as f64;
    let affine = get_affine(header);
    let xform_code = if header.sform_code > 0 { header.sform_code } else { header.qform_code };

    let volume = obj.into_volume();
    let array: Array<f64, _> = volume
        .into_ndarray()
        .map_err(|e| ClustError::Nifti(format!("Failed to convert to ndarray: {}", e)))?;

    let shape = array.shape().to_vec();
    if shape.len() < 3 {
        return Err(ClustError::Nifti(format!("Expected at least 3D array, got {}D", shape.len())));
    }

    // Use the actual array shape for dimensions (nifti-rs may reorder)
    let (dim0, dim1, dim2) = (shape[0], shape[1], shape[2]);
    let n_vols = if shape.len() >= 4 { shape[3] } else { 1 };

    let mut data = Vec::with_capacity(dim0 * dim1 * dim2 * n_vols);
    if shape.len() == 3 {
        for k in 0..dim2 {
            for j in 0..dim1 {
                for i in 0..dim0 {
                    data.push(array[[i, j, k]]);
                }
            }
        }
    } else {
        // Higher dimensions beyond t are not supported; take index 0
        let rest = vec![0usize; shape.len() - 4];
        for t in 0..n_vols {
            for k in 0..dim2 {
                for j in 0..dim1 {
                    for i in 0..dim0 {
                        let mut index = vec![i, j, k, t];
                        index.extend_from_slice(&rest);
                        data.push(array[index.as_slice()]);
                    }
                }
            }
        }
    }

    Ok(NiftiData {
        data,
        dims: (dim0, dim1, dim2),
        n_vols,
        voxel_size,
        affine,
        scl_slope,
        scl_inter,
        datatype,
        xform_code,
    })
}

/// Get affine transformation matrix from header
fn get_affine(header: &NiftiHeader) -> [f64; 16] {
    // Prefer sform if available (sform_code > 0)
    if header.sform_code > 0 {
        let s = &header.srow_x;
        let t = &header.srow_y;
        let u = &header.srow_z;
        [
            s[0] as f64, s[1] as f64, s[2] as f64, s[3] as f64,
            t[0] as f64, t[1] as f64, t[2] as f64, t[3] as f64,
            u[0] as f64, u[1] as f64, u[2] as f64, u[3] as f64,
            0.0, 0.0, 0.0, 1.0,
        ]
    } else {
        // Fall back to identity with voxel scaling
        let vsx = header.pixdim[1] as f64;
        let vsy = header.pixdim[2] as f64;
        let vsz = header.pixdim[3] as f64;
        [
            vsx, 0.0, 0.0, 0.0,
            0.0, vsy, 0.0, 0.0,
            0.0, 0.0, vsz, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

/// Save data as NIfTI bytes
///
/// Writes an uncompressed float32 .nii file. `data` may hold several
/// volumes back to back, in which case a 4D file is written.
pub fn save_nifti(
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<Vec<u8>> {
    let (nx, ny, nz) = dims;
    let (vsx, vsy, vsz) = voxel_size;
    let n_vox = nx * ny * nz;
    if n_vox == 0 || data.len() % n_vox != 0 {
        return Err(ClustError::DimensionMismatch { expected: n_vox, got: data.len() });
    }
    let nt = data.len() / n_vox;

    let to_dim = |n: usize| -> Result<i16> {
        i16::try_from(n).map_err(|_| ClustError::Nifti(format!("Dimension {} too large for NIfTI-1", n)))
    };

    // Create NIfTI-1 header (348 bytes)
    let mut header = [0u8; 348];

    // sizeof_hdr = 348
    header[0..4].copy_from_slice(&348i32.to_le_bytes());

    // dim[0..7]
    let ndim = if nt > 1 { 4 } else { 3 };
    let dim: [i16; 8] = [ndim, to_dim(nx)?, to_dim(ny)?, to_dim(nz)?, to_dim(nt)?, 1, 1, 1];
    for (i, &d) in dim.iter().enumerate() {
        let offset = 40 + i * 2;
        header[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
    }

    // datatype = 16 (FLOAT32)
    header[70..72].copy_from_slice(&16i16.to_le_bytes());

    // bitpix = 32
    header[72..74].copy_from_slice(&32i16.to_le_bytes());

    // pixdim[0..7]
    let pixdim: [f32; 8] = [1.0, vsx as f32, vsy as f32, vsz as f32, 1.0, 1.0, 1.0, 1.0];
    for (i, &p) in pixdim.iter().enumerate() {
        let offset = 76 + i * 4;
        header[offset..offset + 4].copy_from_slice(&p.to_le_bytes());
    }

    // vox_offset = 352 (header + 4 bytes extension)
    header[108..112].copy_from_slice(&352.0f32.to_le_bytes());

    // scl_slope = 1.0, scl_inter = 0.0
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    header[116..120].copy_from_slice(&0.0f32.to_le_bytes());

    // sform_code = 1 (scanner anat)
    header[254..256].copy_from_slice(&1i16.to_le_bytes());

    // srow_x, srow_y, srow_z
    for row in 0..3 {
        for i in 0..4 {
            let offset = 280 + row * 16 + i * 4;
            header[offset..offset + 4].copy_from_slice(&(affine[row * 4 + i] as f32).to_le_bytes());
        }
    }

    // magic = "n+1\0" for NIfTI-1 single file
    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(352 + data.len() * 4);
    buffer.extend_from_slice(&header);
    // Extension (4 bytes, all zeros = no extension)
    buffer.extend_from_slice(&[0u8; 4]);
    for &val in data {
        buffer.extend_from_slice(&(val as f32).to_le_bytes());
    }

    Ok(buffer)
}

/// Save data as gzipped NIfTI bytes (.nii.gz)
pub fn save_nifti_gz(
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let uncompressed = save_nifti(data, dims, voxel_size, affine)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&uncompressed)
        .map_err(|e| ClustError::Nifti(format!("Gzip compression failed: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| ClustError::Nifti(format!("Gzip finish failed: {}", e)))
}

/// Read a NIfTI file from a filesystem path
///
/// Supports both .nii and .nii.gz files.
pub fn read_nifti_file(path: &Path) -> Result<NiftiData> {
    let bytes = std::fs::read(path).map_err(|source| ClustError::Io { path: path.to_path_buf(), source })?;
    load_nifti(&bytes)
}

/// Save NIfTI data to a file
///
/// If the path ends with .nii.gz, the file is gzip compressed.
/// Otherwise it is saved as uncompressed .nii.
pub fn save_nifti_to_file(
    path: &Path,
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<()> {
    let path_str = path.to_string_lossy();
    let bytes = if path_str.ends_with(".nii.gz") {
        save_nifti_gz(data, dims, voxel_size, affine)?
    } else {
        save_nifti(data, dims, voxel_size, affine)?
    };

    std::fs::write(path, &bytes).map_err(|source| ClustError::Io { path: path.to_path_buf(), source })
}
