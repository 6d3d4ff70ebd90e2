//! Label-to-value sets with elementwise arithmetic and controlled rounding.
//!
//! A [`LabeledValueSet`] fixes its labels at construction. Every binary
//! operation requires both operands to carry exactly the same labels and
//! fails with [`StatsError::LabelMismatch`] otherwise.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Serialize;

use crate::StatsError;

/// An ordered mapping from labels to numeric values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledValueSet<L: Ord, V> {
    values: BTreeMap<L, V>,
}

impl<L: Ord, V> Default for LabeledValueSet<L, V> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<L: Ord + Clone + Debug, V: Copy> LabeledValueSet<L, V> {
    /// Wrap an existing map.
    pub const fn new(values: BTreeMap<L, V>) -> Self {
        Self { values }
    }

    /// A set holding `value` for every label.
    pub fn uniform<I>(labels: I, value: V) -> Self
    where
        I: IntoIterator<Item = L>,
    {
        Self {
            values: labels.into_iter().map(|l| (l, value)).collect(),
        }
    }

    /// Value for `label`, if the label belongs to the set.
    pub fn get(&self, label: &L) -> Option<V> {
        self.values.get(label).copied()
    }

    /// Labels in natural order.
    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.values.keys()
    }

    /// Label/value pairs in natural label order.
    pub fn iter(&self) -> impl Iterator<Item = (&L, V)> {
        self.values.iter().map(|(l, v)| (l, *v))
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overwrite the value of an existing label.
    pub fn set(&mut self, label: &L, value: V) -> Result<(), StatsError> {
        let slot = self
            .values
            .get_mut(label)
            .ok_or_else(|| StatsError::LabelMismatch {
                label: format!("{label:?}"),
            })?;
        *slot = value;
        Ok(())
    }

    /// Apply `f` to every value.
    pub fn map<U, F>(&self, f: F) -> LabeledValueSet<L, U>
    where
        F: Fn(V) -> U,
    {
        LabeledValueSet {
            values: self.values.iter().map(|(l, v)| (l.clone(), f(*v))).collect(),
        }
    }

    /// Apply `f` to every label/value pair.
    pub fn map_labeled<U, F>(&self, f: F) -> LabeledValueSet<L, U>
    where
        F: Fn(&L, V) -> U,
    {
        LabeledValueSet {
            values: self.values.iter().map(|(l, v)| (l.clone(), f(l, *v))).collect(),
        }
    }

    /// Combine with `other` label by label.
    pub fn zip_with<W, U, F>(
        &self,
        other: &LabeledValueSet<L, W>,
        f: F,
    ) -> Result<LabeledValueSet<L, U>, StatsError>
    where
        W: Copy,
        F: Fn(V, W) -> U,
    {
        if let Some(label) = other.values.keys().find(|l| !self.values.contains_key(*l)) {
            return Err(StatsError::LabelMismatch {
                label: format!("{label:?}"),
            });
        }
        let mut values = BTreeMap::new();
        for (label, v) in &self.values {
            let w = other
                .values
                .get(label)
                .ok_or_else(|| StatsError::LabelMismatch {
                    label: format!("{label:?}"),
                })?;
            values.insert(label.clone(), f(*v, *w));
        }
        Ok(LabeledValueSet { values })
    }
}

// ---------------------------------------------------------------------------
// Real-valued sets
// ---------------------------------------------------------------------------

impl<L: Ord + Clone + Debug> LabeledValueSet<L, f64> {
    /// Elementwise sum.
    pub fn values_plus_values(&self, other: &Self) -> Result<Self, StatsError> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Elementwise difference `self - other`.
    pub fn values_subtract_values(&self, other: &Self) -> Result<Self, StatsError> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Every value multiplied by `n`.
    pub fn product_of_values_and_n(&self, n: f64) -> Self {
        self.map(|v| v * n)
    }

    /// Sum of all values.
    pub fn sum(&self) -> f64 {
        self.values.values().sum()
    }

    /// Every value truncated downwards.
    pub fn floor_values(&self) -> Self {
        self.map(f64::floor)
    }

    /// Negative values replaced by zero.
    pub fn clamp_negative(&self) -> Self {
        self.map(|v| v.max(0.0))
    }

    /// Values divided by their sum. A zero-sum set is returned unchanged.
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total <= 0.0 {
            return self.clone();
        }
        self.map(|v| v / total)
    }

    /// Round every value to an integer such that the rounded values sum to
    /// `round(sum)` and each differs from its input by less than one.
    ///
    /// Values are floored, then the labels with the largest fractional
    /// remainders are incremented until the total is met. Equal remainders
    /// keep natural label order.
    pub fn controlled_rounding_maintaining_sum(&self) -> LabeledValueSet<L, i64> {
        let target = to_count(self.sum().round());

        let mut floored: BTreeMap<L, i64> = BTreeMap::new();
        let mut remainders: Vec<(&L, f64)> = Vec::with_capacity(self.values.len());
        let mut floor_total: i64 = 0;

        for (label, value) in &self.values {
            let floor = value.floor();
            let count = to_count(floor);
            floor_total = floor_total.saturating_add(count);
            remainders.push((label, value - floor));
            floored.insert(label.clone(), count);
        }

        // Stable sort: ties stay in label order.
        remainders.sort_by(|a, b| b.1.total_cmp(&a.1));

        let deficit = usize::try_from(target.saturating_sub(floor_total)).unwrap_or(0);
        for (label, _) in remainders.iter().take(deficit) {
            if let Some(count) = floored.get_mut(*label) {
                *count = count.saturating_add(1);
            }
        }

        LabeledValueSet { values: floored }
    }
}

// ---------------------------------------------------------------------------
// Integer-valued sets
// ---------------------------------------------------------------------------

impl<L: Ord + Clone + Debug> LabeledValueSet<L, i64> {
    /// Sum of all values, saturating.
    pub fn sum(&self) -> i64 {
        self.values
            .values()
            .fold(0_i64, |acc, v| acc.saturating_add(*v))
    }

    /// Elementwise sum, saturating.
    pub fn values_plus_values(&self, other: &Self) -> Result<Self, StatsError> {
        self.zip_with(other, i64::saturating_add)
    }

    /// Values widened to `f64`.
    pub fn to_real(&self) -> LabeledValueSet<L, f64> {
        self.map(count_to_real)
    }
}

/// Convert an already-integral `f64` to a count. Saturates at the `i64`
/// bounds and maps NaN to zero.
pub(crate) fn to_count(value: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let count = value as i64;
    count
}

/// Widen a count to `f64`. Counts stay far below 2^52.
pub(crate) fn count_to_real(count: i64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let real = count as f64;
    real
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn set(pairs: &[(&'static str, f64)]) -> LabeledValueSet<&'static str, f64> {
        LabeledValueSet::new(pairs.iter().copied().collect())
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn rounding_preserves_rounded_sum() {
        let s = set(&[("a", 2.8), ("b", 9.3)]);
        let r = s.controlled_rounding_maintaining_sum();
        assert_eq!(r.get(&"a"), Some(3));
        assert_eq!(r.get(&"b"), Some(9));
        assert_eq!(r.sum(), 12);
    }

    #[test]
    fn rounding_stays_within_one_of_input() {
        let s = set(&[("a", 0.4), ("b", 0.4), ("c", 0.4), ("d", 3.9), ("e", 7.0)]);
        let r = s.controlled_rounding_maintaining_sum();
        assert_eq!(r.sum(), 12);
        for (label, value) in s.iter() {
            let rounded = count_to_real(r.get(label).unwrap());
            assert!((rounded - value).abs() < 1.0);
        }
    }

    #[test]
    fn rounding_ties_follow_label_order() {
        let s = set(&[("c", 0.5), ("a", 0.5), ("b", 0.5)]);
        let r = s.controlled_rounding_maintaining_sum();
        // round(1.5) == 2: the first two labels in natural order win.
        assert_eq!(r.get(&"a"), Some(1));
        assert_eq!(r.get(&"b"), Some(1));
        assert_eq!(r.get(&"c"), Some(0));
    }

    #[test]
    fn rounding_single_label_rounds_half_up() {
        let r = set(&[("x", 2.5)]).controlled_rounding_maintaining_sum();
        assert_eq!(r.get(&"x"), Some(3));
        let r = set(&[("x", 2.49)]).controlled_rounding_maintaining_sum();
        assert_eq!(r.get(&"x"), Some(2));
    }

    #[test]
    fn rounding_empty_set() {
        let r = LabeledValueSet::<&str, f64>::default().controlled_rounding_maintaining_sum();
        assert!(r.is_empty());
        assert_eq!(r.sum(), 0);
    }

    #[test]
    fn arithmetic_is_elementwise() {
        let a = set(&[("x", 1.5), ("y", 2.0)]);
        let b = set(&[("x", 0.5), ("y", 4.0)]);
        let sum = a.values_plus_values(&b).unwrap();
        assert_close(sum.get(&"x").unwrap(), 2.0);
        let diff = a.values_subtract_values(&b).unwrap();
        assert_close(diff.get(&"y").unwrap(), -2.0);
        assert_close(a.product_of_values_and_n(10.0).sum(), 35.0);
        assert_close(a.floor_values().sum(), 3.0);
    }

    #[test]
    fn mismatched_labels_fail() {
        let a = set(&[("x", 1.0), ("y", 2.0)]);
        let b = set(&[("x", 1.0), ("z", 2.0)]);
        assert!(matches!(
            a.values_plus_values(&b),
            Err(StatsError::LabelMismatch { .. })
        ));
        let c = set(&[("x", 1.0)]);
        assert!(a.values_subtract_values(&c).is_err());
        assert!(c.values_subtract_values(&a).is_err());
    }

    #[test]
    fn set_rejects_unknown_label() {
        let mut a = set(&[("x", 1.0)]);
        assert!(a.set(&"x", 4.0).is_ok());
        assert!(a.set(&"q", 4.0).is_err());
        assert_close(a.sum(), 4.0);
    }

    #[test]
    fn normalized_sums_to_one() {
        let a = set(&[("x", 1.0), ("y", 3.0)]);
        assert_close(a.normalized().sum(), 1.0);
        assert_close(a.normalized().get(&"y").unwrap(), 0.75);
        let zero = set(&[("x", 0.0)]);
        assert_close(zero.normalized().sum(), 0.0);
    }

    #[test]
    fn clamp_and_integer_helpers() {
        let a = set(&[("x", -2.0), ("y", 3.0)]).clamp_negative();
        assert_close(a.get(&"x").unwrap(), 0.0);
        let counts = a.controlled_rounding_maintaining_sum();
        let doubled = counts.values_plus_values(&counts).unwrap();
        assert_eq!(doubled.sum(), 6);
        assert_close(doubled.to_real().sum(), 6.0);
    }
}
