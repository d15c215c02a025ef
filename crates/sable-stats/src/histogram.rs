//! Equal-width histograms for selectivity estimation.
//!
//! An [`IntHistogram`] splits `[min, max]` into buckets of equal width and
//! counts how many values land in each. Estimates assume values are spread
//! uniformly inside a bucket. [`StringHistogram`] maps each string onto an
//! integer and reuses the integer histogram.

use sable_common::{Op, Result, SableError};

/// Histogram over a fixed integer domain.
#[derive(Debug, Clone)]
pub struct IntHistogram {
    counts: Vec<u64>,
    min: i32,
    max: i32,
    width: i64,
    total: u64,
}

impl IntHistogram {
    /// Creates an empty histogram with `buckets` buckets over `[min, max]`.
    ///
    /// Bucket width is `ceil((max - min) / buckets)`, never less than one.
    pub fn new(buckets: usize, min: i32, max: i32) -> Result<Self> {
        if buckets == 0 {
            return Err(SableError::InvalidParameter {
                name: "buckets".to_string(),
                value: "0".to_string(),
            });
        }
        if min > max {
            return Err(SableError::InvalidParameter {
                name: "min".to_string(),
                value: format!("{min} is greater than max {max}"),
            });
        }
        let span = max as i64 - min as i64;
        let width = (span.div_euclid(buckets as i64) + i64::from(span % buckets as i64 != 0)).max(1);
        Ok(Self {
            counts: vec![0; buckets],
            min,
            max,
            width,
            total: 0,
        })
    }

    pub fn num_buckets(&self) -> usize {
        self.counts.len()
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn bucket_width(&self) -> i64 {
        self.width
    }

    /// Number of values recorded.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn bucket_counts(&self) -> &[u64] {
        &self.counts
    }

    /// Records one value. Values outside `[min, max]` are ignored.
    pub fn add_value(&mut self, v: i32) {
        if let Some(i) = self.bucket_of(v) {
            self.counts[i] += 1;
            self.total += 1;
        }
    }

    /// Estimated fraction of recorded values `x` for which `x op v` holds.
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        match op {
            Op::Equals | Op::Like => self.equals(v),
            Op::NotEquals => 1.0 - self.equals(v),
            Op::GreaterThan => self.greater_than(v),
            Op::LessThanOrEq => 1.0 - self.greater_than(v),
            Op::LessThan => self.less_than(v),
            Op::GreaterThanOrEq => 1.0 - self.less_than(v),
        }
    }

    /// Average selectivity across all predicates. Not tracked, so always 1.
    pub fn avg_selectivity(&self) -> f64 {
        1.0
    }

    fn bucket_of(&self, v: i32) -> Option<usize> {
        if v < self.min || v > self.max {
            return None;
        }
        let i = (v as i64 - self.min as i64) / self.width;
        // The top of the domain can spill one bucket past the end when the
        // range divides evenly; it belongs to the last bucket.
        Some((i as usize).min(self.counts.len() - 1))
    }

    fn share(&self, count: u64) -> f64 {
        count as f64 / self.total as f64
    }

    fn equals(&self, v: i32) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        match self.bucket_of(v) {
            Some(i) => (self.share(self.counts[i]) / self.width as f64).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    fn greater_than(&self, v: i32) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        if v < self.min {
            return 1.0;
        }
        let Some(i) = self.bucket_of(v) else {
            return 0.0;
        };
        let right = self.min as i64 + (i as i64 + 1) * self.width - 1;
        let part = ((right - v as i64) as f64 / self.width as f64).clamp(0.0, 1.0);
        let above: u64 = self.counts[i + 1..].iter().sum();
        (self.share(self.counts[i]) * part + self.share(above)).clamp(0.0, 1.0)
    }

    fn less_than(&self, v: i32) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        if v > self.max {
            return 1.0;
        }
        let Some(i) = self.bucket_of(v) else {
            return 0.0;
        };
        let left = self.min as i64 + i as i64 * self.width;
        let part = ((v as i64 - left) as f64 / self.width as f64).clamp(0.0, 1.0);
        let below: u64 = self.counts[..i].iter().sum();
        (self.share(self.counts[i]) * part + self.share(below)).clamp(0.0, 1.0)
    }
}

impl std::fmt::Display for IntHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "IntHistogram [{}, {}] width {} total {}",
            self.min, self.max, self.width, self.total
        )?;
        for (i, count) in self.counts.iter().enumerate() {
            writeln!(f, "bucket {}: {}", i, count)?;
        }
        Ok(())
    }
}

/// Histogram over strings, keyed by their first four bytes.
#[derive(Debug, Clone)]
pub struct StringHistogram {
    inner: IntHistogram,
}

/// Number of leading bytes that determine a string's position.
const PREFIX_LEN: usize = 4;

impl StringHistogram {
    pub fn new(buckets: usize) -> Result<Self> {
        let inner = IntHistogram::new(buckets, Self::min_key(), Self::max_key())?;
        Ok(Self { inner })
    }

    /// Key of the empty string, the bottom of the domain.
    pub fn min_key() -> i32 {
        prefix_key("")
    }

    /// Key of `"zzzz"`, the top of the domain.
    pub fn max_key() -> i32 {
        prefix_key("zzzz")
    }

    /// Maps `s` into the histogram domain. Prefixes sorting above `"zzzz"`
    /// are clamped to the top.
    pub fn string_to_key(s: &str) -> i32 {
        prefix_key(s).clamp(Self::min_key(), Self::max_key())
    }

    pub fn add_value(&mut self, s: &str) {
        self.inner.add_value(Self::string_to_key(s));
    }

    pub fn estimate_selectivity(&self, op: Op, s: &str) -> f64 {
        self.inner.estimate_selectivity(op, Self::string_to_key(s))
    }

    pub fn avg_selectivity(&self) -> f64 {
        self.inner.avg_selectivity()
    }

    pub fn total(&self) -> u64 {
        self.inner.total()
    }

    pub fn int_histogram(&self) -> &IntHistogram {
        &self.inner
    }
}

impl std::fmt::Display for StringHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// First four bytes as a big-endian integer, zero padded. Bytes past 0x7f
/// saturate so the key stays positive.
fn prefix_key(s: &str) -> i32 {
    let mut key = [0u8; PREFIX_LEN];
    for (dst, &src) in key.iter_mut().zip(s.as_bytes()) {
        *dst = src.min(0x7f);
    }
    i32::from_be_bytes(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_0_99(buckets: usize) -> IntHistogram {
        let mut hist = IntHistogram::new(buckets, 0, 99).unwrap();
        for v in 0..100 {
            hist.add_value(v);
        }
        hist
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_new_rejects_bad_parameters() {
        assert!(IntHistogram::new(0, 0, 10).is_err());
        assert!(IntHistogram::new(10, 5, 4).is_err());
    }

    #[test]
    fn test_bucket_width() {
        assert_eq!(IntHistogram::new(10, 0, 99).unwrap().bucket_width(), 10);
        assert_eq!(IntHistogram::new(10, 0, 100).unwrap().bucket_width(), 10);
        assert_eq!(IntHistogram::new(3, 0, 10).unwrap().bucket_width(), 4);
        assert_eq!(IntHistogram::new(100, 1, 10).unwrap().bucket_width(), 1);
        assert_eq!(IntHistogram::new(5, 7, 7).unwrap().bucket_width(), 1);
        let wide = IntHistogram::new(2, i32::MIN, i32::MAX).unwrap();
        assert_eq!(wide.bucket_width(), (u32::MAX as i64 + 1) / 2);
    }

    #[test]
    fn test_add_value_ignores_out_of_domain() {
        let mut hist = IntHistogram::new(4, 0, 7).unwrap();
        hist.add_value(-1);
        hist.add_value(8);
        assert_eq!(hist.total(), 0);
        hist.add_value(0);
        hist.add_value(7);
        assert_eq!(hist.bucket_counts(), &[1, 0, 0, 1]);
    }

    #[test]
    fn test_top_value_lands_in_last_bucket() {
        let mut hist = IntHistogram::new(10, 0, 100).unwrap();
        hist.add_value(100);
        assert_eq!(hist.bucket_counts()[9], 1);
        assert_eq!(hist.total(), 1);
    }

    #[test]
    fn test_uniform_estimates() {
        let hist = uniform_0_99(10);
        assert_close(hist.estimate_selectivity(Op::Equals, 5), 0.01);
        assert_close(hist.estimate_selectivity(Op::GreaterThan, 94), 0.05);
        assert_close(hist.estimate_selectivity(Op::LessThan, 5), 0.05);
        assert_close(hist.estimate_selectivity(Op::GreaterThan, 49), 0.5);
        assert_close(hist.estimate_selectivity(Op::Like, 5), 0.01);
    }

    #[test]
    fn test_out_of_domain() {
        let hist = uniform_0_99(10);
        assert_eq!(hist.estimate_selectivity(Op::Equals, -5), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::Equals, 500), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::GreaterThan, -5), 1.0);
        assert_eq!(hist.estimate_selectivity(Op::GreaterThan, 500), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::LessThan, -5), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::LessThan, 500), 1.0);
        assert_eq!(hist.estimate_selectivity(Op::NotEquals, 500), 1.0);
        assert_eq!(hist.estimate_selectivity(Op::LessThanOrEq, -5), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::GreaterThanOrEq, -5), 1.0);
    }

    #[test]
    fn test_complements() {
        let hist = uniform_0_99(10);
        for v in [-3, 0, 17, 50, 99, 120] {
            let eq = hist.estimate_selectivity(Op::Equals, v);
            let gt = hist.estimate_selectivity(Op::GreaterThan, v);
            let lt = hist.estimate_selectivity(Op::LessThan, v);
            assert_eq!(hist.estimate_selectivity(Op::NotEquals, v), 1.0 - eq);
            assert_eq!(hist.estimate_selectivity(Op::LessThanOrEq, v), 1.0 - gt);
            assert_eq!(hist.estimate_selectivity(Op::GreaterThanOrEq, v), 1.0 - lt);
        }
    }

    #[test]
    fn test_empty_histogram() {
        let hist = IntHistogram::new(10, 0, 99).unwrap();
        assert_eq!(hist.estimate_selectivity(Op::Equals, 5), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::GreaterThan, -5), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::LessThan, 500), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::NotEquals, 5), 1.0);
    }

    #[test]
    fn test_skewed_distribution() {
        let mut hist = IntHistogram::new(10, 0, 99).unwrap();
        for _ in 0..90 {
            hist.add_value(3);
        }
        for v in 90..100 {
            hist.add_value(v);
        }
        assert!(hist.estimate_selectivity(Op::LessThan, 10) > 0.85);
        assert!(hist.estimate_selectivity(Op::GreaterThan, 10) < 0.15);
    }

    #[test]
    fn test_display_lists_buckets() {
        let hist = uniform_0_99(2);
        let text = hist.to_string();
        assert!(text.contains("bucket 0: 50"));
        assert!(text.contains("bucket 1: 50"));
    }

    #[test]
    fn test_string_keys() {
        assert_eq!(StringHistogram::min_key(), 0);
        assert_eq!(StringHistogram::max_key(), 0x7a7a_7a7a);
        assert_eq!(StringHistogram::string_to_key("a"), 0x6100_0000);
        assert_eq!(StringHistogram::string_to_key("abcdef"), 0x6162_6364);
        assert_eq!(StringHistogram::string_to_key("~~~~"), 0x7a7a_7a7a);
        assert!(StringHistogram::string_to_key("apple") < StringHistogram::string_to_key("banana"));
    }

    #[test]
    fn test_string_histogram_estimates() {
        let mut hist = StringHistogram::new(100).unwrap();
        for word in ["apple", "banana", "cherry", "date"] {
            for _ in 0..25 {
                hist.add_value(word);
            }
        }
        assert_eq!(hist.total(), 100);
        assert!(hist.estimate_selectivity(Op::Equals, "banana") > 0.0);
        assert_eq!(hist.estimate_selectivity(Op::LessThan, ""), 0.0);
        let gt = hist.estimate_selectivity(Op::GreaterThan, "b");
        assert!(gt > 0.6 && gt <= 0.75, "got {gt}");
    }
}
