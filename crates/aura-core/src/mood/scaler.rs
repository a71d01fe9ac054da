//! Per-feature standardization

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::features::FEATURE_COUNT;

/// Rows used for the placeholder fit of an untrained model
const PLACEHOLDER_ROWS: usize = 100;

/// Z-score normalizer: `(x - mean) / sqrt(var)`
///
/// Features with zero variance are only centered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f32>,
    pub var: Vec<f32>,
}

impl StandardScaler {
    /// Fit mean and population variance per column
    pub fn fit(rows: &Array2<f32>) -> Result<Self, InferenceError> {
        if rows.nrows() == 0 {
            return Err(InferenceError::Numeric(
                "Cannot fit scaler on zero rows".to_string(),
            ));
        }
        let mean = rows
            .mean_axis(Axis(0))
            .ok_or_else(|| InferenceError::Numeric("Empty scaler input".to_string()))?;
        let var = rows.var_axis(Axis(0), 0.0);
        Ok(Self {
            mean: mean.to_vec(),
            var: var.to_vec(),
        })
    }

    /// Fit on standard-normal rows, for a model that has not been trained
    pub fn placeholder<R: Rng>(rng: &mut R) -> Self {
        let rows = Array2::from_shape_fn((PLACEHOLDER_ROWS, FEATURE_COUNT), |_| {
            rng.sample::<f32, _>(StandardNormal)
        });
        log::debug!("Fitting placeholder scaler on {} random rows", PLACEHOLDER_ROWS);
        // 100 rows always fit
        Self::fit(&rows).unwrap_or_else(|_| Self::identity(FEATURE_COUNT))
    }

    /// Scaler that leaves its input unchanged
    pub fn identity(width: usize) -> Self {
        Self {
            mean: vec![0.0; width],
            var: vec![1.0; width],
        }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize a batch of rows
    pub fn transform(&self, batch: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        if batch.ncols() != self.n_features() {
            return Err(InferenceError::Shape {
                expected: self.n_features(),
                found: batch.ncols(),
            });
        }
        let mean = Array1::from(self.mean.clone());
        let scale: Array1<f32> = self
            .var
            .iter()
            .map(|&v| if v > 0.0 { v.sqrt() } else { 1.0 })
            .collect();
        Ok((batch - &mean) / &scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fit_population_variance() {
        let rows = array![[1.0f32, 10.0], [3.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.mean, vec![2.0, 10.0]);
        assert_eq!(scaler.var, vec![1.0, 0.0]);
    }

    #[test]
    fn test_transform_zero_variance_is_centered() {
        let scaler = StandardScaler {
            mean: vec![2.0, 10.0],
            var: vec![4.0, 0.0],
        };
        let out = scaler.transform(&array![[6.0f32, 12.0]]).unwrap();
        assert_eq!(out, array![[2.0f32, 2.0]]);
    }

    #[test]
    fn test_transform_shape_mismatch() {
        let scaler = StandardScaler::identity(FEATURE_COUNT);
        let err = scaler.transform(&Array2::zeros((1, 3))).unwrap_err();
        assert!(matches!(err, InferenceError::Shape { expected: 19, found: 3 }));
    }

    #[test]
    fn test_placeholder_is_seeded() {
        let a = StandardScaler::placeholder(&mut StdRng::seed_from_u64(7));
        let b = StandardScaler::placeholder(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.n_features(), FEATURE_COUNT);
        // Standard normal data: mean near 0, variance near 1
        assert!(a.mean.iter().all(|m| m.abs() < 0.5));
        assert!(a.var.iter().all(|v| *v > 0.4 && *v < 2.0));
    }
}
