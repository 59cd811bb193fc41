//! Voxel editing applied before clustering
//!
//! Edits zero out voxels so that only the "active" ones remain:
//! 1. threshold on a separate threshold sub-brick (|t| < thresh)
//! 2. clip small magnitudes (|v| < clip)
//! 3. clip a value range (lo <= v <= hi)
//! 4. drop negative values

use crate::error::{ClustError, Result};

/// Editing parameters; the default edits nothing
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EditParams {
    /// Zero voxels whose threshold value has magnitude below this
    pub thresh: Option<f64>,
    /// Zero voxels with |v| < clip
    pub clip: Option<f64>,
    /// Zero voxels with lo <= v <= hi
    pub two_clip: Option<(f64, f64)>,
    /// Zero voxels with v < 0
    pub no_negative: bool,
}

impl EditParams {
    pub fn is_noop(&self) -> bool {
        self.thresh.is_none() && self.clip.is_none() && self.two_clip.is_none() && !self.no_negative
    }
}

/// Apply edits in place.
///
/// # Arguments
/// * `data` - Values of the data sub-brick
/// * `thresh_data` - Threshold sub-brick; the data itself is used when None
/// * `params` - Edits to apply
///
/// # Returns
/// Number of voxels still nonzero
pub fn apply_edits(data: &mut [f64], thresh_data: Option<&[f64]>, params: &EditParams) -> Result<usize> {
    if let Some(t) = thresh_data {
        if t.len() != data.len() {
            return Err(ClustError::DimensionMismatch { expected: data.len(), got: t.len() });
        }
    }

    if let Some(thr) = params.thresh {
        match thresh_data {
            Some(t) => {
                for (v, &tv) in data.iter_mut().zip(t.iter()) {
                    if tv.abs() < thr {
                        *v = 0.0;
                    }
                }
            }
            None => {
                for v in data.iter_mut() {
                    if v.abs() < thr {
                        *v = 0.0;
                    }
                }
            }
        }
    }

    if let Some(clip) = params.clip {
        for v in data.iter_mut() {
            if v.abs() < clip {
                *v = 0.0;
            }
        }
    }

    if let Some((lo, hi)) = params.two_clip {
        for v in data.iter_mut() {
            if *v >= lo && *v <= hi {
                *v = 0.0;
            }
        }
    }

    if params.no_negative {
        for v in data.iter_mut() {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
    }

    Ok(data.iter().filter(|&&v| v != 0.0).count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop() {
        let mut data = vec![-1.0, 0.0, 0.5, 3.0];
        let n = apply_edits(&mut data, None, &EditParams::default()).unwrap();
        assert_eq!(n, 3);
        assert_eq!(data, vec![-1.0, 0.0, 0.5, 3.0]);
        assert!(EditParams::default().is_noop());
    }

    #[test]
    fn test_clip_and_noneg() {
        let mut data = vec![-3.0, -0.2, 0.2, 3.0];
        let params = EditParams { clip: Some(0.3), no_negative: true, ..Default::default() };
        let n = apply_edits(&mut data, None, &params).unwrap();
        assert_eq!(n, 1);
        assert_eq!(data, vec![0.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_two_clip_inclusive() {
        let mut data = vec![-1.0, 0.0, 0.5, 1.0, 2.0];
        let params = EditParams { two_clip: Some((-1.0, 1.0)), ..Default::default() };
        apply_edits(&mut data, None, &params).unwrap();
        assert_eq!(data, vec![0.0, 0.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_threshold_brick() {
        let mut data = vec![10.0, 20.0, 30.0];
        let t = vec![1.0, -3.5, 2.0];
        let params = EditParams { thresh: Some(2.5), ..Default::default() };
        let n = apply_edits(&mut data, Some(&t), &params).unwrap();
        assert_eq!(n, 1);
        assert_eq!(data, vec![0.0, 20.0, 0.0]);

        assert!(apply_edits(&mut data, Some(&[1.0]), &params).is_err());
    }

    #[test]
    fn test_threshold_on_data_itself() {
        let mut data = vec![1.0, -4.0, 2.0];
        let params = EditParams { thresh: Some(2.0), ..Default::default() };
        apply_edits(&mut data, None, &params).unwrap();
        assert_eq!(data, vec![0.0, -4.0, 2.0]);
    }
}
