//! Square convolution kernels

use crate::error::{GlazierError, Result};

/// Square matrix of convolution weights stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    size: usize,
    weights: Vec<f32>,
}

impl Kernel {
    /// Normalized 2D Gaussian of `size`×`size` with sigma = size / 2
    ///
    /// The peak sits on the geometric centre of the matrix, so the kernel is
    /// symmetric under a 180° rotation for even sizes as well as odd ones.
    ///
    /// # Errors
    /// - `size` is zero
    pub fn gaussian(size: u32) -> Result<Self> {
        if size == 0 {
            return Err(GlazierError::invalid_parameter(
                "Gaussian kernel size must be greater than zero",
            ));
        }

        let size = size as usize;
        let sigma = size as f64 / 2.0;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let center = (size as f64 - 1.0) / 2.0;

        let raw: Vec<f64> = (0..size * size)
            .map(|i| {
                let dy = (i / size) as f64 - center;
                let dx = (i % size) as f64 - center;
                (-(dx * dx + dy * dy) / two_sigma_sq).exp()
            })
            .collect();

        let total: f64 = raw.iter().sum();
        let weights = raw.into_iter().map(|w| (w / total) as f32).collect();

        Ok(Self { size, weights })
    }

    /// 3×3 sharpening kernel: −1 around the centre, `amount + 8` in the middle
    ///
    /// The weights sum to `amount`, so the result is not normalized.
    #[must_use]
    pub fn sharpen(amount: f32) -> Self {
        let mut weights = vec![-1.0; 9];
        weights[4] = amount + 8.0;
        Self { size: 3, weights }
    }

    /// Build a kernel from row-major weights
    ///
    /// # Errors
    /// - `size` is zero or `weights` does not hold `size * size` values
    pub fn from_weights(size: usize, weights: Vec<f32>) -> Result<Self> {
        if size == 0 || weights.len() != size * size {
            return Err(GlazierError::invalid_parameter(format!(
                "Kernel of size {} needs {} weights, got {}",
                size,
                size * size,
                weights.len()
            )));
        }
        Ok(Self { size, weights })
    }

    /// Edge length of the kernel
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Weight at column `kx`, row `ky`
    #[must_use]
    pub fn weight(&self, kx: usize, ky: usize) -> f32 {
        self.weights.get(ky * self.size + kx).copied().unwrap_or(0.0)
    }

    /// Row-major weights
    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Sum of all weights
    #[must_use]
    pub fn sum(&self) -> f32 {
        self.weights.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_sums_to_one() {
        for size in 1..=15 {
            let kernel = Kernel::gaussian(size).unwrap();
            assert_eq!(kernel.size(), size as usize);
            assert!(
                (kernel.sum() - 1.0).abs() < 1e-4,
                "size {} sums to {}",
                size,
                kernel.sum()
            );
        }
    }

    #[test]
    fn test_gaussian_is_symmetric_under_rotation() {
        for size in 1..=12u32 {
            let kernel = Kernel::gaussian(size).unwrap();
            let n = kernel.size();
            for ky in 0..n {
                for kx in 0..n {
                    let rotated = kernel.weight(n - 1 - kx, n - 1 - ky);
                    assert!((kernel.weight(kx, ky) - rotated).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_gaussian_peaks_at_center() {
        let kernel = Kernel::gaussian(5).unwrap();
        let center = kernel.weight(2, 2);
        assert!(kernel.weights().iter().all(|&w| w <= center));
        assert!(kernel.weight(0, 0) < kernel.weight(1, 1));
    }

    #[test]
    fn test_gaussian_rejects_zero_size() {
        assert!(matches!(
            Kernel::gaussian(0),
            Err(GlazierError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_sharpen_kernel_layout() {
        let kernel = Kernel::sharpen(1.5);
        assert_eq!(kernel.size(), 3);
        assert!((kernel.weight(1, 1) - 9.5).abs() < f32::EPSILON);
        assert!((kernel.weight(0, 2) + 1.0).abs() < f32::EPSILON);
        assert!((kernel.sum() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_from_weights_validates_length() {
        assert!(Kernel::from_weights(2, vec![0.25; 4]).is_ok());
        assert!(Kernel::from_weights(2, vec![0.25; 3]).is_err());
        assert!(Kernel::from_weights(0, vec![]).is_err());
    }
}
