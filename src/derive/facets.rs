//! Salary bounds, salary histogram and category facets over a job list.

use serde::{Deserialize, Serialize};

use crate::api::types::Job;

/// Bars in the salary histogram.
pub const SALARY_BARS: usize = 30;

/// Minimum padding applied when every fee is identical.
const MIN_BUFFER: f64 = 10_000.0;

/// Fee range of a job set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalaryBounds {
  pub min: f64,
  pub max: f64,
}

impl SalaryBounds {
  /// Range of the parseable fees, or `None` when no fee parses.
  ///
  /// A single distinct fee is padded by `max(10000, round(fee * 10%))` on both
  /// sides so a range slider never collapses.
  pub fn from_jobs(jobs: &[Job]) -> Option<Self> {
    let mut fees = jobs.iter().filter_map(Job::fee_amount);
    let first = fees.next()?;
    let (mut min, mut max) = fees.fold((first, first), |(lo, hi), f| (lo.min(f), hi.max(f)));

    if min == max {
      let buffer = MIN_BUFFER.max((min * 0.1).round());
      min -= buffer;
      max += buffer;
    }

    Some(Self { min, max })
  }

  /// Width of one histogram bar.
  pub fn step(&self, bars: usize) -> f64 {
    (self.max - self.min) / bars.max(1) as f64
  }
}

/// Sorted, de-duplicated, non-empty job positions.
pub fn categories(jobs: &[Job]) -> Vec<String> {
  let mut positions: Vec<String> = jobs
    .iter()
    .filter_map(|j| j.position.as_deref())
    .filter(|p| !p.is_empty())
    .map(String::from)
    .collect();
  positions.sort();
  positions.dedup();
  positions
}

/// Number of jobs whose fee falls in each of `bars` equal slices of `bounds`.
pub fn salary_histogram(jobs: &[Job], bounds: SalaryBounds, bars: usize) -> Vec<usize> {
  let mut counts = vec![0; bars];
  if bars == 0 {
    return counts;
  }

  let step = bounds.step(bars);
  for fee in jobs.iter().filter_map(Job::fee_amount) {
    if fee < bounds.min || fee > bounds.max {
      continue;
    }
    let slot = if step > 0.0 {
      ((fee - bounds.min) / step).floor() as usize
    } else {
      0
    };
    counts[slot.min(bars - 1)] += 1;
  }
  counts
}

/// Whether bar `i` starts inside the selected `[min_salary, max_salary]`.
pub fn is_bar_active(i: usize, bars: usize, bounds: SalaryBounds, min_salary: f64, max_salary: f64) -> bool {
  if bounds.max == 0.0 {
    return false;
  }
  let value = bounds.min + i as f64 * bounds.step(bars);
  value >= min_salary && value <= max_salary
}

#[cfg(test)]
mod tests {
  use super::*;

  fn job(position: &str, fee: &str) -> Job {
    Job {
      id: fee.into(),
      position: Some(position.to_string()),
      fee: Some(fee.to_string()),
      ..Default::default()
    }
  }

  #[test]
  fn test_bounds_ignore_unparsable_fees() {
    let jobs = vec![job("A", "100000"), job("B", "negotiable"), job("C", "250000")];
    assert_eq!(
      SalaryBounds::from_jobs(&jobs),
      Some(SalaryBounds {
        min: 100_000.0,
        max: 250_000.0
      })
    );
  }

  #[test]
  fn test_equal_fees_get_a_buffer() {
    let small = SalaryBounds::from_jobs(&[job("A", "50000")]).unwrap();
    assert_eq!((small.min, small.max), (40_000.0, 60_000.0));

    let large = SalaryBounds::from_jobs(&[job("A", "500000"), job("B", "500000")]).unwrap();
    assert_eq!((large.min, large.max), (450_000.0, 550_000.0));
  }

  #[test]
  fn test_no_fees_no_bounds() {
    assert_eq!(SalaryBounds::from_jobs(&[job("A", "n/a")]), None);
    assert_eq!(SalaryBounds::from_jobs(&[]), None);
  }

  #[test]
  fn test_categories_sorted_unique() {
    let jobs = vec![job("Waiter", "1"), job("Cook", "2"), job("Waiter", "3"), job("", "4")];
    assert_eq!(categories(&jobs), vec!["Cook", "Waiter"]);
  }

  #[test]
  fn test_histogram_counts() {
    let jobs = vec![job("A", "0"), job("B", "10"), job("C", "100"), job("D", "x")];
    let bounds = SalaryBounds { min: 0.0, max: 100.0 };

    let bars = salary_histogram(&jobs, bounds, 10);

    assert_eq!(bars.len(), 10);
    assert_eq!(bars[0], 1);
    assert_eq!(bars[1], 1);
    assert_eq!(bars[9], 1);
    assert_eq!(bars.iter().sum::<usize>(), 3);
  }

  #[test]
  fn test_active_bars_follow_selection() {
    let bounds = SalaryBounds { min: 0.0, max: 300.0 };
    assert!(is_bar_active(0, SALARY_BARS, bounds, 0.0, 300.0));
    assert!(!is_bar_active(0, SALARY_BARS, bounds, 50.0, 300.0));
    assert!(is_bar_active(10, SALARY_BARS, bounds, 50.0, 150.0));
    assert!(!is_bar_active(20, SALARY_BARS, bounds, 50.0, 150.0));
  }
}
