/*!
Stale focus filter.

Two notification paths can report the same focus change with independently
sampled tick counts, so an older one may arrive after a newer one. Ticks
wrap, so age is measured as a wrapping difference.
*/

/// Remembers the last delivered focus tick and rejects older ones.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FocusFilter {
  window: u32,
  last: Option<u32>,
}

impl FocusFilter {
  pub(crate) const fn new(window: u32) -> Self {
    Self { window, last: None }
  }

  /// An event strictly older than the last delivered one by less than the
  /// window is stale.
  pub(crate) fn is_stale(&self, timestamp: u32) -> bool {
    self.last.is_some_and(|last| {
      let age = last.wrapping_sub(timestamp);
      age != 0 && age < self.window
    })
  }

  /// Make `timestamp` the reference once an event carrying it was delivered.
  /// Ignored if a newer event got there first.
  pub(crate) fn record(&mut self, timestamp: u32) {
    if !self.is_stale(timestamp) {
      self.last = Some(timestamp);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn admit(filter: &mut FocusFilter, timestamp: u32) -> bool {
    let fresh = !filter.is_stale(timestamp);
    if fresh {
      filter.record(timestamp);
    }
    fresh
  }

  fn admitted(window: u32, stamps: &[u32]) -> Vec<bool> {
    let mut filter = FocusFilter::new(window);
    stamps.iter().map(|t| admit(&mut filter, *t)).collect()
  }

  #[test]
  fn older_within_window_is_dropped() {
    assert_eq!(admitted(5000, &[100, 98, 105]), vec![true, false, true]);
  }

  #[test]
  fn equal_timestamps_pass() {
    assert_eq!(admitted(5000, &[7, 7]), vec![true, true]);
  }

  #[test]
  fn wraparound_counts_as_newer() {
    assert_eq!(admitted(5000, &[u32::MAX - 10, 5, u32::MAX - 20]), vec![true, true, false]);
  }

  #[test]
  fn checking_does_not_move_the_reference() {
    let mut filter = FocusFilter::new(5000);
    assert!(!filter.is_stale(100));
    assert!(!filter.is_stale(98), "100 was never delivered");
    filter.record(98);
    filter.record(90);
    assert!(filter.is_stale(95));
    assert!(!filter.is_stale(99));
  }

  #[test]
  fn much_older_is_treated_as_wrapped() {
    assert_eq!(admitted(5000, &[100_000, 10_000]), vec![true, true]);
  }

  mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
      #[test]
      fn increasing_ticks_always_pass(start in any::<u32>(), steps in prop::collection::vec(0u32..4000, 1..20)) {
        let mut filter = FocusFilter::new(5000);
        let mut tick = start;
        prop_assert!(admit(&mut filter, tick));
        for step in steps {
          tick = tick.wrapping_add(step);
          prop_assert!(admit(&mut filter, tick));
        }
      }

      #[test]
      fn stale_ticks_never_move_the_reference(last in any::<u32>(), back in 1u32..5000) {
        let mut filter = FocusFilter::new(5000);
        prop_assert!(admit(&mut filter, last));
        prop_assert!(!admit(&mut filter, last.wrapping_sub(back)));
        prop_assert!(!admit(&mut filter, last.wrapping_sub(back)));
        prop_assert!(admit(&mut filter, last.wrapping_add(1)));
      }
    }
  }
}
