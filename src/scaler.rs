//! Zero-mean, unit-variance scaling of the RFM feature matrix

use ndarray::{Array1, Array2, Axis};

use crate::error::{SegmentationError, SegmentationResult};
use crate::rfm::CustomerMetrics;

/// Per-column standardization fitted once on a population and reused for any
/// later transform of that population.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    /// Population standard deviation, with zero replaced by 1
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit column means and standard deviations
    pub fn fit(data: &Array2<f64>) -> SegmentationResult<Self> {
        if data.nrows() == 0 {
            return Err(SegmentationError::InvalidInput(
                "cannot fit scaler on an empty matrix".into(),
            ));
        }
        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| SegmentationError::InvalidInput("empty feature matrix".into()))?;
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }

    pub fn inverse_transform(&self, data: &Array2<f64>) -> Array2<f64> {
        data * &self.scale + &self.mean
    }

    /// Scale a single `[recency, frequency, monetary]` row
    pub fn transform_row(&self, row: &[f64; 3]) -> SegmentationResult<Array1<f64>> {
        if self.mean.len() != row.len() {
            return Err(SegmentationError::InvalidInput(format!(
                "expected {} features, got {}",
                self.mean.len(),
                row.len()
            )));
        }
        Ok((Array1::from(row.to_vec()) - &self.mean) / &self.scale)
    }
}

/// Standardized feature matrix for a customer population, with the scaler
/// that produced it
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// `(n_customers, 3)` standardized recency, frequency, monetary
    pub features: Array2<f64>,
    pub scaler: StandardScaler,
}

impl FeatureMatrix {
    pub fn from_metrics(metrics: &[CustomerMetrics]) -> SegmentationResult<Self> {
        let values: Vec<f64> = metrics.iter().flat_map(|m| m.as_features()).collect();
        let raw = Array2::from_shape_vec((metrics.len(), 3), values)
            .map_err(|e| SegmentationError::InvalidInput(e.to_string()))?;
        let scaler = StandardScaler::fit(&raw)?;
        let features = scaler.transform(&raw);
        Ok(Self { features, scaler })
    }
}
