//! Per-evaluation accounting of steps, allocated cells and wall time.
//!
//! A cell is one value; string payloads add one cell per byte. Charges are
//! cumulative and made before the allocation they pay for.

use std::time::Instant;

use super::error::{EvalError, EvalResult};
use super::EvalLimits;

/// How often (in steps or polls) the wall clock is consulted.
const CLOCK_CHECK_INTERVAL: u64 = 256;

pub struct Budget<'a> {
  limits: &'a EvalLimits,
  steps: u64,
  polls: u64,
  cells: u64,
  started: Instant,
}

impl<'a> Budget<'a> {
  pub fn new(limits: &'a EvalLimits) -> Self {
    Self { limits, steps: 0, polls: 0, cells: 0, started: Instant::now() }
  }

  pub fn steps(&self) -> u64 { self.steps }

  pub fn cells(&self) -> u64 { self.cells }

  /// One interpreter step.
  pub fn tick(&mut self) -> EvalResult<()> {
    self.steps += 1;
    if self.steps > self.limits.max_steps {
      return Err(EvalError::limit(format!("evaluation exceeded {} steps", self.limits.max_steps)));
    }
    self.poll()
  }

  /// Deadline check for loops inside a single operation; costs no steps.
  pub fn poll(&mut self) -> EvalResult<()> {
    self.polls += 1;
    if self.polls % CLOCK_CHECK_INTERVAL == 0 {
      self.check_deadline()?;
    }
    Ok(())
  }

  fn check_deadline(&self) -> EvalResult<()> {
    if self.started.elapsed().as_millis() > u128::from(self.limits.timeout_ms) {
      return Err(EvalError::limit(format!("evaluation exceeded {} ms", self.limits.timeout_ms)));
    }
    Ok(())
  }

  /// Reserve `cells` ahead of an allocation.
  pub fn charge(&mut self, cells: u64) -> EvalResult<()> {
    self.cells = self.cells.saturating_add(cells);
    if self.cells > self.limits.max_cells {
      return Err(EvalError::limit(format!(
        "evaluation would allocate more than {} cells",
        self.limits.max_cells
      )));
    }
    self.poll()
  }

  /// Cap on the top-level length of any single collection or string.
  pub fn check_len(&self, len: usize) -> EvalResult<()> {
    if len > self.limits.max_collection_len {
      return Err(EvalError::limit(format!(
        "result would hold more than {} items",
        self.limits.max_collection_len
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn charges_accumulate_until_the_cap() {
    let limits = EvalLimits { max_cells: 100, ..EvalLimits::default() };
    let mut budget = Budget::new(&limits);
    budget.charge(60).unwrap();
    budget.charge(40).unwrap();
    assert!(matches!(budget.charge(1), Err(EvalError::Limit(_))));
    assert!(matches!(budget.charge(u64::MAX), Err(EvalError::Limit(_))));
  }

  #[test]
  fn polling_notices_the_deadline() {
    let limits = EvalLimits { timeout_ms: 0, ..EvalLimits::default() };
    let mut budget = Budget::new(&limits);
    std::thread::sleep(std::time::Duration::from_millis(2));
    let err = (0..CLOCK_CHECK_INTERVAL).try_for_each(|_| budget.poll()).unwrap_err();
    assert!(err.to_string().contains("ms"), "{err}");
    assert_eq!(budget.steps(), 0);
  }

  #[test]
  fn steps_are_capped() {
    let limits = EvalLimits { max_steps: 3, ..EvalLimits::default() };
    let mut budget = Budget::new(&limits);
    for _ in 0..3 {
      budget.tick().unwrap();
    }
    assert!(matches!(budget.tick(), Err(EvalError::Limit(_))));
  }
}
