//! Wait-time consensus
//!
//! Each merged entity owns a `WaitAccumulator` holding the (source, wait)
//! samples reported for it. The accumulator is consumed once by
//! `resolve` and never leaves the resolver.

use chrono::{DateTime, Utc};

/// One source's wait time for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSample {
    pub source: String,
    pub wait_time: u32,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct WaitAccumulator {
    samples: Vec<WaitSample>,
}

impl WaitAccumulator {
    pub(crate) fn push(&mut self, source: &str, wait_time: Option<u32>, observed_at: DateTime<Utc>) {
        if let Some(wait_time) = wait_time {
            self.samples.push(WaitSample {
                source: source.to_string(),
                wait_time,
                observed_at,
            });
        }
    }

    pub(crate) fn samples(&self) -> &[WaitSample] {
        &self.samples
    }

    /// Rounded consensus of the collected samples; `None` when there are none
    pub(crate) fn resolve(self, rounding: u32) -> Option<u32> {
        let values: Vec<u32> = self.samples.iter().map(|s| s.wait_time).collect();
        resolve_wait(&values, rounding)
    }
}

/// Round to the nearest multiple of `step` (halves round up)
pub fn round_to_step(value: f64, step: u32) -> u32 {
    if step == 0 {
        return value.round().max(0.0) as u32;
    }
    let step = f64::from(step);
    ((value / step).round() * step).max(0.0) as u32
}

fn median(sorted: &[u32]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0
    } else {
        f64::from(sorted[mid])
    }
}

/// Unrounded consensus value
///
/// - 2 values: arithmetic mean
/// - 3 values: the value two sources agree on, else the median
/// - more: median of the sorted values
pub fn consensus(values: &[u32]) -> Option<f64> {
    match values {
        [] => None,
        [only] => Some(f64::from(*only)),
        [a, b] => Some((f64::from(*a) + f64::from(*b)) / 2.0),
        [a, b, c] => {
            if a == b || a == c {
                Some(f64::from(*a))
            } else if b == c {
                Some(f64::from(*b))
            } else {
                let mut sorted = [*a, *b, *c];
                sorted.sort_unstable();
                Some(f64::from(sorted[1]))
            }
        }
        _ => {
            let mut sorted = values.to_vec();
            sorted.sort_unstable();
            Some(median(&sorted))
        }
    }
}

/// Consensus rounded to the nearest `rounding`-minute multiple
pub fn resolve_wait(values: &[u32], rounding: u32) -> Option<u32> {
    consensus(values).map(|v| round_to_step(v, rounding))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_agree() {
        assert_eq!(resolve_wait(&[25, 25, 30], 5), Some(25));
        assert_eq!(resolve_wait(&[40, 20, 40], 5), Some(40));
        assert_eq!(resolve_wait(&[12, 33, 33], 5), Some(35));
    }

    #[test]
    fn test_all_differ_uses_median() {
        assert_eq!(resolve_wait(&[60, 10, 30], 5), Some(30));
        assert_eq!(resolve_wait(&[21, 5, 90], 5), Some(20));
    }

    #[test]
    fn test_two_values_mean() {
        assert_eq!(resolve_wait(&[20, 30], 5), Some(25));
        // 27.5 rounds to 30
        assert_eq!(resolve_wait(&[25, 30], 5), Some(30));
    }

    #[test]
    fn test_many_values_median() {
        assert_eq!(resolve_wait(&[5, 50, 10, 15], 5), Some(15));
        assert_eq!(resolve_wait(&[5, 50, 10, 15, 100], 5), Some(15));
    }

    #[test]
    fn test_empty() {
        assert_eq!(resolve_wait(&[], 5), None);
    }

    #[test]
    fn test_round_to_step() {
        assert_eq!(round_to_step(22.0, 5), 20);
        assert_eq!(round_to_step(22.5, 5), 25);
        assert_eq!(round_to_step(23.0, 5), 25);
        assert_eq!(round_to_step(7.4, 0), 7);
    }

    #[test]
    fn test_accumulator_ignores_missing_waits() {
        let now = Utc::now();
        let mut acc = WaitAccumulator::default();
        acc.push("a", Some(10), now);
        acc.push("b", None, now);
        assert_eq!(acc.samples().len(), 1);
        assert_eq!(acc.resolve(5), Some(10));
    }

    #[test]
    fn test_single_sample_is_rounded() {
        let now = Utc::now();
        let mut acc = WaitAccumulator::default();
        acc.push("a", Some(23), now);
        assert_eq!(acc.resolve(5), Some(25));
        assert_eq!(resolve_wait(&[7], 5), Some(5));
        assert_eq!(resolve_wait(&[41], 10), Some(40));
    }
}
