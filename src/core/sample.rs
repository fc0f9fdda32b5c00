use super::error::{BudgetError, Result};

/// Values paired with non-negative survey weights. Filtering and arithmetic
/// keep the two vectors aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSample {
    values: Vec<f64>,
    weights: Vec<f64>,
}

impl WeightedSample {
    pub fn new(values: Vec<f64>, weights: Vec<f64>) -> Result<Self> {
        if values.len() != weights.len() {
            return Err(BudgetError::LengthMismatch {
                what: "weights",
                left: values.len(),
                right: weights.len(),
            });
        }
        if let Some((index, &weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(BudgetError::InvalidWeight { index, weight });
        }
        Ok(Self { values, weights })
    }

    pub fn uniform(values: Vec<f64>) -> Self {
        let weights = vec![1.0; values.len()];
        Self { values, weights }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn sum(&self) -> f64 {
        self.values
            .iter()
            .zip(&self.weights)
            .map(|(v, w)| v * w)
            .sum()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Weighted mean over this sample's own weights. An empty or zero-weight
    /// sample has mean 0.
    pub fn mean(&self) -> f64 {
        let total = self.total_weight();
        if total > 0.0 { self.sum() / total } else { 0.0 }
    }

    pub fn mask(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.len() {
            return Err(BudgetError::LengthMismatch {
                what: "mask entries",
                left: self.len(),
                right: mask.len(),
            });
        }
        let (values, weights) = self
            .values
            .iter()
            .zip(&self.weights)
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|((v, w), _)| (*v, *w))
            .unzip();
        Ok(Self { values, weights })
    }

    /// `self - baseline`, elementwise. Both samples must carry the same weights.
    pub fn difference(&self, baseline: &WeightedSample) -> Result<Self> {
        if self.len() != baseline.len() {
            return Err(BudgetError::LengthMismatch {
                what: "baseline values",
                left: self.len(),
                right: baseline.len(),
            });
        }
        if self.weights != baseline.weights {
            return Err(BudgetError::WeightMismatch);
        }
        let values = self
            .values
            .iter()
            .zip(&baseline.values)
            .map(|(r, b)| r - b)
            .collect();
        Ok(Self {
            values,
            weights: self.weights.clone(),
        })
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            values: self.values.iter().map(|v| f(*v)).collect(),
            weights: self.weights.clone(),
        }
    }

    /// Same values under an externally supplied weight vector, e.g. one row of
    /// an area-by-household allocation matrix. The simulation's own weights
    /// are discarded.
    pub fn reweighted(&self, weights: &[f64]) -> Result<Self> {
        Self::new(self.values.clone(), weights.to_vec())
    }
}

/// Percentage change relative to a baseline. Non-positive baselines report 0.
pub fn relative_change(change: f64, baseline: f64) -> f64 {
    if baseline > 0.0 {
        change / baseline * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};
    use proptest::collection::vec;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample() -> WeightedSample {
        WeightedSample::new(vec![10.0, 20.0, 30.0, 40.0], vec![1.0, 3.0, 0.0, 4.0])
            .expect("valid sample")
    }

    #[test]
    fn sum_and_mean_use_weights() {
        let s = sample();
        assert_approx(s.sum(), 10.0 + 60.0 + 160.0);
        assert_approx(s.total_weight(), 8.0);
        assert_approx(s.mean(), 230.0 / 8.0);
    }

    #[test]
    fn masked_mean_renormalises_by_masked_weight() {
        let s = sample();
        let sub = s.mask(&[false, true, false, true]).expect("mask");
        assert_eq!(sub.len(), 2);
        assert_approx(sub.total_weight(), 7.0);
        assert_approx(sub.mean(), (60.0 + 160.0) / 7.0);
    }

    #[test]
    fn zero_weight_group_has_zero_mean() {
        let s = sample();
        assert_approx(s.mask(&[false, false, true, false]).expect("mask").mean(), 0.0);
        assert_approx(s.mask(&[false; 4]).expect("mask").mean(), 0.0);
    }

    #[test]
    fn rejects_mismatched_lengths_and_bad_weights() {
        assert!(matches!(
            WeightedSample::new(vec![1.0, 2.0], vec![1.0]),
            Err(BudgetError::LengthMismatch { .. })
        ));
        assert!(matches!(
            WeightedSample::new(vec![1.0, 2.0], vec![1.0, -0.5]),
            Err(BudgetError::InvalidWeight { index: 1, .. })
        ));
        assert!(matches!(
            WeightedSample::new(vec![1.0], vec![f64::NAN]),
            Err(BudgetError::InvalidWeight { index: 0, .. })
        ));
        assert!(sample().mask(&[true]).is_err());
    }

    #[test]
    fn difference_keeps_weights_and_requires_them_equal() {
        let baseline = sample();
        let reform = baseline.map(|v| v + 5.0);
        let diff = reform.difference(&baseline).expect("difference");
        assert_eq!(diff.weights(), baseline.weights());
        assert_approx(diff.sum(), 5.0 * 8.0);

        let other = WeightedSample::uniform(vec![1.0; 4]);
        assert!(matches!(
            reform.difference(&other),
            Err(BudgetError::WeightMismatch)
        ));
    }

    #[test]
    fn reweighted_swaps_weight_source() {
        let s = sample();
        let area = s.reweighted(&[0.0, 0.0, 2.0, 0.0]).expect("reweight");
        assert_approx(area.mean(), 30.0);
        assert!(s.reweighted(&[1.0]).is_err());
    }

    #[test]
    fn relative_change_guards_non_positive_baseline() {
        assert_approx(relative_change(5.0, 100.0), 5.0);
        assert_approx(relative_change(5.0, 0.0), 0.0);
        assert_approx(relative_change(5.0, -10.0), 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_complementary_masks_partition_the_total(
            rows in vec((-10_000i32..10_000, 0u32..500, proptest::bool::ANY), 0..40)
        ) {
            let values: Vec<f64> = rows.iter().map(|(v, _, _)| *v as f64).collect();
            let weights: Vec<f64> = rows.iter().map(|(_, w, _)| *w as f64 / 10.0).collect();
            let mask: Vec<bool> = rows.iter().map(|(_, _, m)| *m).collect();
            let inverse: Vec<bool> = mask.iter().map(|m| !m).collect();

            let s = WeightedSample::new(values, weights).expect("valid sample");
            let inside = s.mask(&mask).expect("mask");
            let outside = s.mask(&inverse).expect("mask");

            prop_assert!((inside.sum() + outside.sum() - s.sum()).abs() <= 1e-6);
            prop_assert!(
                (inside.total_weight() + outside.total_weight() - s.total_weight()).abs() <= 1e-6
            );
            prop_assert!(inside.mean().is_finite());
        }
    }
}
