use std::{
  sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

#[derive(Debug, Default)]
struct State {
  values: Vec<f64>,
  /// Bumped on every append and clear.
  version: u64,
}

#[derive(Debug, Default)]
struct Shared {
  state: Mutex<State>,
  changed: Condvar,
}

/// Append-only sequence of sampled epoch errors shared between a training run
/// and its observers.
///
/// Clones share the same storage. Every read pass and every append happens under
/// one lock, so readers always see a prefix of the appended values.
#[derive(Debug, Clone, Default)]
pub struct ErrorHistory {
  shared: Arc<Shared>,
}

impl ErrorHistory {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    // a panicking writer cannot leave the vector half-written
    self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(crate) fn push(&self, error: f64) {
    let mut state = self.lock();
    state.values.push(error);
    state.version += 1;
    drop(state);
    self.shared.changed.notify_all();
  }

  pub(crate) fn clear(&self) {
    let mut state = self.lock();
    state.values.clear();
    state.version += 1;
    drop(state);
    self.shared.changed.notify_all();
  }

  pub fn len(&self) -> usize {
    self.lock().values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn version(&self) -> u64 {
    self.lock().version
  }

  pub fn last(&self) -> Option<f64> {
    self.lock().values.last().copied()
  }

  pub fn snapshot(&self) -> Vec<f64> {
    self.lock().values.clone()
  }

  /// Values appended after the first `offset` ones.
  pub fn since(&self, offset: usize) -> Vec<f64> {
    self.lock().values.get(offset..).map(<[f64]>::to_vec).unwrap_or_default()
  }

  /// Runs `f` over the values while holding the lock.
  pub fn with_values<R>(&self, f: impl FnOnce(&[f64]) -> R) -> R {
    f(&self.lock().values)
  }

  /// Blocks until the version moves past `seen` or the timeout elapses, and
  /// returns the current version.
  pub fn wait_for_change(&self, seen: u64, timeout: Duration) -> u64 {
    let guard = self.lock();
    let (guard, _) = self
      .shared
      .changed
      .wait_timeout_while(guard, timeout, |state| state.version == seen)
      .unwrap_or_else(PoisonError::into_inner);
    guard.version
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use super::*;

  #[test]
  fn push_and_clear_bump_version() {
    let history = ErrorHistory::new();
    assert!(history.is_empty());
    history.push(0.5);
    history.push(0.25);
    assert_eq!(history.snapshot(), vec![0.5, 0.25]);
    assert_eq!(history.version(), 2);
    assert_eq!(history.last(), Some(0.25));
    history.clear();
    assert!(history.is_empty());
    assert_eq!(history.version(), 3);
  }

  #[test]
  fn since_returns_tail() {
    let history = ErrorHistory::new();
    for v in [3.0, 2.0, 1.0] {
      history.push(v);
    }
    assert_eq!(history.since(1), vec![2.0, 1.0]);
    assert!(history.since(3).is_empty());
    assert!(history.since(10).is_empty());
    assert_eq!(history.with_values(|v| v.iter().sum::<f64>()), 6.0);
  }

  #[test]
  fn wait_times_out_without_change() {
    let history = ErrorHistory::new();
    let version = history.wait_for_change(0, Duration::from_millis(10));
    assert_eq!(version, 0);
  }

  #[test]
  fn concurrent_reader_sees_ordered_prefix() {
    let history = ErrorHistory::new();
    let writer = {
      let history = history.clone();
      thread::spawn(move || {
        for i in 0..1000 {
          history.push(i as f64);
        }
      })
    };

    let mut seen = 0;
    while seen < 1000 {
      seen = history.wait_for_change(seen as u64, Duration::from_millis(50)) as usize;
      history.with_values(|values| {
        assert!(values.iter().enumerate().all(|(i, v)| *v == i as f64));
      });
    }
    writer.join().unwrap();
    assert_eq!(history.len(), 1000);
  }
}
