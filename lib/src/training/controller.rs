use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use super::{
  config::validate_learning_rate, min_max_scale, shuffle_in_lockstep, ConfigUpdate, ErrorHistory,
  TrainingConfig,
};
use crate::{
  dataset::Dataset,
  error::{Error, Result},
  model::{BackPropagation, Network, Topology},
};

/// Every this many epochs the current error is appended to the history.
pub const HISTORY_SAMPLE_EPOCHS: usize = 100;

/// Cooperative cancellation flag for one run. Checked once per epoch.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
  Converged,
  Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
  pub epochs: usize,
  pub final_error: f64,
  pub outcome: RunOutcome,
}

/// Handle to a launched run. Dropping it detaches the run.
#[derive(Debug)]
pub struct RunHandle {
  task: JoinHandle<RunReport>,
  cancel: CancelHandle,
}

impl RunHandle {
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn cancel_handle(&self) -> CancelHandle {
    self.cancel.clone()
  }

  pub fn is_finished(&self) -> bool {
    self.task.is_finished()
  }

  /// Waits for the run to end. Panics if the training step panicked.
  pub async fn wait(self) -> RunReport {
    match self.task.await {
      Ok(report) => report,
      Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
  }
}

/// Clears the running flag when the run ends, including by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

/// Everything a background run needs, moved onto the worker.
struct Run {
  network: Arc<RwLock<Network>>,
  history: ErrorHistory,
  cancel: CancelHandle,
  config: TrainingConfig,
  inputs: Vec<Vec<f64>>,
  targets: Vec<Vec<f64>>,
  desired_error: f64,
}

impl Run {
  fn execute(mut self) -> RunReport {
    let learning = BackPropagation::new(self.config.learning_rate);
    if self.config.scale {
      min_max_scale(&mut self.inputs);
    }

    let mut epochs = 0usize;
    let (outcome, final_error) = loop {
      if self.config.shuffle {
        shuffle_in_lockstep(&mut self.inputs, &mut self.targets, epochs as u64);
      }

      let error = {
        let mut network = write(&self.network);
        learning.run_epoch(&mut network, &self.inputs, &self.targets)
      };
      epochs += 1;

      if epochs % HISTORY_SAMPLE_EPOCHS == 0 {
        debug!(epochs, error, "sampled epoch error");
        self.history.push(error);
      }

      if self.cancel.is_cancelled() {
        break (RunOutcome::Cancelled, error);
      }
      if error <= self.desired_error {
        break (RunOutcome::Converged, error);
      }
    };

    info!(epochs, final_error, ?outcome, "training run finished");
    RunReport {
      epochs,
      final_error,
      outcome,
    }
  }
}

fn read(network: &RwLock<Network>) -> RwLockReadGuard<'_, Network> {
  network.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(network: &RwLock<Network>) -> RwLockWriteGuard<'_, Network> {
  network.write().unwrap_or_else(PoisonError::into_inner)
}

/// Owns a network, its training data and settings, and drives asynchronous
/// training runs over them.
///
/// At most one run is active at a time. While it is, the network, the settings
/// and the history can only be observed; every mutating command fails with
/// [`Error::InvalidState`].
#[derive(Debug)]
pub struct TrainingController {
  network: Arc<RwLock<Network>>,
  config: TrainingConfig,
  data: Dataset,
  running: Arc<AtomicBool>,
  cancel: CancelHandle,
  history: ErrorHistory,
}

impl TrainingController {
  pub fn new(network: Network) -> Self {
    Self::with_config(network, TrainingConfig::default())
  }

  pub fn with_config(network: Network, config: TrainingConfig) -> Self {
    Self {
      network: Arc::new(RwLock::new(network)),
      config,
      data: Dataset::default(),
      running: Arc::new(AtomicBool::new(false)),
      cancel: CancelHandle::default(),
      history: ErrorHistory::new(),
    }
  }

  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }

  fn ensure_idle(&self, operation: &str) -> Result<()> {
    if self.is_running() {
      Err(Error::state(format!("cannot {} while training is running", operation)))
    } else {
      Ok(())
    }
  }

  /// Shared handle to the sampled error history.
  pub fn history(&self) -> ErrorHistory {
    self.history.clone()
  }

  pub fn config(&self) -> &TrainingConfig {
    &self.config
  }

  pub fn data(&self) -> &Dataset {
    &self.data
  }

  /// Copy of the network as of the last finished epoch.
  pub fn network_snapshot(&self) -> Network {
    read(&self.network).clone()
  }

  pub fn topology(&self) -> Topology {
    read(&self.network).topology()
  }

  pub fn set_config(&mut self, update: ConfigUpdate) -> Result<()> {
    self.ensure_idle("change the training configuration")?;
    self.config = self.config.updated(&update)?;
    Ok(())
  }

  pub fn set_learning_rate(&mut self, rate: f64) -> Result<()> {
    self.ensure_idle("change the learning rate")?;
    validate_learning_rate(rate)?;
    self.config.learning_rate = rate;
    Ok(())
  }

  pub fn set_shuffle(&mut self, shuffle: bool) -> Result<()> {
    self.ensure_idle("change shuffling")?;
    self.config.shuffle = shuffle;
    Ok(())
  }

  pub fn set_scale(&mut self, scale: bool) -> Result<()> {
    self.ensure_idle("change scaling")?;
    self.config.scale = scale;
    Ok(())
  }

  /// Replaces the training data. Allowed during a run, which keeps training on
  /// the copy it took at start.
  pub fn set_training_data(&mut self, inputs: Vec<Vec<f64>>, targets: Vec<Vec<f64>>) -> Result<()> {
    self.set_dataset(Dataset::new(inputs, targets))
  }

  pub fn set_dataset(&mut self, data: Dataset) -> Result<()> {
    {
      let network = read(&self.network);
      data.validate(network.inputs_count(), network.outputs_count())?;
    }
    debug!(rows = data.len(), "training data replaced");
    self.data = data;
    Ok(())
  }

  /// Replaces the network with a freshly initialized one of the given shape.
  pub fn reconfigure_network(&mut self, topology: &Topology) -> Result<()> {
    self.ensure_idle("replace the network")?;
    let network = Network::new(topology)?;
    self.set_network(network)
  }

  pub fn set_network(&mut self, network: Network) -> Result<()> {
    self.ensure_idle("replace the network")?;
    info!(topology = ?network.topology(), "network replaced");
    self.network = Arc::new(RwLock::new(network));
    self.history.clear();
    Ok(())
  }

  /// Re-randomizes the weights and forgets the error history.
  pub fn reset(&mut self) -> Result<()> {
    self.ensure_idle("reset")?;
    write(&self.network).randomize();
    self.history.clear();
    info!("network weights reset");
    Ok(())
  }

  /// Forward computation on the current network. During a run this waits for
  /// the current epoch to finish.
  pub fn test(&self, input: &[f64]) -> Result<Vec<f64>> {
    write(&self.network).compute(input)
  }

  /// Requests the active run to stop after its current epoch. No-op when idle.
  pub fn cancel(&self) {
    if self.is_running() {
      debug!("cancellation requested");
      self.cancel.cancel();
    }
  }

  /// Launches a training run on the blocking pool of the current Tokio runtime
  /// and returns without waiting for it.
  ///
  /// The run stops once an epoch's summed error is at most `desired_error`, or
  /// after the epoch during which cancellation was requested.
  #[instrument(level = "info", skip(self), fields(rows = self.data.len()))]
  pub fn start(&mut self, desired_error: f64) -> Result<RunHandle> {
    self.ensure_idle("start training")?;
    if !(desired_error.is_finite() && desired_error > 0.0) {
      return Err(Error::argument(format!(
        "desired error must be positive, got {}",
        desired_error
      )));
    }
    {
      let network = read(&self.network);
      self
        .data
        .validate(network.inputs_count(), network.outputs_count())?;
    }
    let runtime = tokio::runtime::Handle::try_current()
      .map_err(|_| Error::state("training must be started from within a Tokio runtime"))?;

    if self
      .running
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      return Err(Error::state("training is already running"));
    }

    self.cancel = CancelHandle::default();
    let run = Run {
      network: Arc::clone(&self.network),
      history: self.history.clone(),
      cancel: self.cancel.clone(),
      config: self.config.clone(),
      inputs: self.data.inputs.clone(),
      targets: self.data.targets.clone(),
      desired_error,
    };
    let guard = RunningGuard(Arc::clone(&self.running));
    info!(config = ?self.config, "training started");
    let task = runtime.spawn_blocking(move || {
      let _guard = guard;
      run.execute()
    });

    Ok(RunHandle {
      task,
      cancel: self.cancel.clone(),
    })
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use rand::{rngs::StdRng, SeedableRng};

  use super::*;
  use crate::{dataset::iris, model::Activation};

  fn iris_controller(seed: u64) -> TrainingController {
    let mut rng = StdRng::seed_from_u64(seed);
    let network = Network::with_rng(&Topology::iris(&[5]), Activation::default(), &mut rng).unwrap();
    let mut controller = TrainingController::new(network);
    controller.set_dataset(iris::load()).unwrap();
    controller
  }

  fn tiny_controller() -> TrainingController {
    let mut rng = StdRng::seed_from_u64(1);
    let network = Network::with_rng(&Topology::new(1, vec![1]), Activation::default(), &mut rng).unwrap();
    let mut controller = TrainingController::new(network);
    controller
      .set_training_data(vec![vec![0.0], vec![1.0]], vec![vec![0.2], vec![0.8]])
      .unwrap();
    controller
  }

  #[test]
  fn set_training_data_checks_shapes() {
    let mut controller = iris_controller(1);
    assert!(controller
      .set_training_data(vec![vec![1.0; 4]; 2], vec![vec![0.0; 3]; 2])
      .is_ok());
    assert!(matches!(
      controller.set_training_data(vec![vec![1.0; 4]; 2], vec![vec![0.0; 3]; 3]),
      Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
      controller.set_training_data(vec![vec![1.0; 5]; 2], vec![vec![0.0; 3]; 2]),
      Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
      controller.set_training_data(vec![vec![1.0; 4]; 2], vec![vec![0.0; 2]; 2]),
      Err(Error::InvalidArgument(_))
    ));
    // failed calls keep the previous data
    assert_eq!(controller.data().len(), 2);
  }

  #[test]
  fn test_returns_outputs_without_history() {
    let controller = iris_controller(2);
    let out = controller.test(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|v| v.is_finite()));
    assert!(controller.history().is_empty());
    assert_eq!(controller.history().version(), 0);
    assert!(matches!(
      controller.test(&[1.0, 2.0, 3.0]),
      Err(Error::InvalidArgument(_))
    ));
  }

  #[test]
  fn start_requires_runtime() {
    let mut controller = tiny_controller();
    assert!(matches!(controller.start(0.1), Err(Error::InvalidState(_))));
    assert!(!controller.is_running());
  }

  #[test]
  fn cancel_when_idle_is_noop() {
    let controller = tiny_controller();
    controller.cancel();
    controller.cancel();
    assert!(!controller.is_running());
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn start_validates_arguments() {
    let mut controller = tiny_controller();
    for bad in [0.0, -1.0, f64::NAN] {
      assert!(matches!(controller.start(bad), Err(Error::InvalidArgument(_))));
    }

    let mut empty = TrainingController::new(controller.network_snapshot());
    assert!(matches!(empty.start(0.1), Err(Error::InvalidArgument(_))));
    assert!(!empty.is_running());
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn start_rejects_data_that_no_longer_fits() {
    let mut controller = iris_controller(3);
    controller.reconfigure_network(&Topology::new(2, vec![3])).unwrap();
    assert!(matches!(controller.start(0.1), Err(Error::InvalidArgument(_))));
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn commands_fail_while_running() {
    let mut controller = iris_controller(4);
    let run = controller.start(1e-9).unwrap();
    assert!(controller.is_running());

    let before = controller.history().snapshot();
    assert!(matches!(controller.start(0.1), Err(Error::InvalidState(_))));
    assert!(matches!(controller.reset(), Err(Error::InvalidState(_))));
    assert!(matches!(
      controller.reconfigure_network(&Topology::iris(&[2])),
      Err(Error::InvalidState(_))
    ));
    assert!(matches!(controller.set_learning_rate(0.5), Err(Error::InvalidState(_))));
    assert!(matches!(controller.set_shuffle(true), Err(Error::InvalidState(_))));
    assert!(matches!(controller.set_scale(true), Err(Error::InvalidState(_))));
    assert!(matches!(
      controller.set_config(ConfigUpdate::default().scale(true)),
      Err(Error::InvalidState(_))
    ));
    assert_eq!(controller.config(), &TrainingConfig::default());
    let after = controller.history().snapshot();
    assert_eq!(&after[..before.len()], &before[..]);

    // observers keep working during the run
    assert_eq!(controller.test(&[5.1, 3.5, 1.4, 0.2]).unwrap().len(), 3);
    assert_eq!(controller.topology(), Topology::iris(&[5]));

    controller.cancel();
    let report = run.wait().await;
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert!(!controller.is_running());
    assert!(controller.set_learning_rate(0.5).is_ok());
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn immediate_cancel_stops_after_one_epoch() {
    let mut controller = iris_controller(5);
    let run = controller.start(1e-12).unwrap();
    controller.cancel();
    let report = run.wait().await;
    assert!(report.epochs >= 1);
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert!(!controller.is_running());
    assert!(controller.history().len() <= 1);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn history_samples_every_hundredth_epoch() {
    let mut controller = iris_controller(6);
    let run = controller.start(1e-12).unwrap();
    let history = controller.history();
    while history.len() < 3 {
      history.wait_for_change(history.version(), Duration::from_millis(100));
    }
    run.cancel();
    let report = run.wait().await;
    assert_eq!(history.len(), report.epochs / HISTORY_SAMPLE_EPOCHS);
    assert!(history.snapshot().iter().all(|e| e.is_finite() && *e >= 0.0));
    if report.epochs % HISTORY_SAMPLE_EPOCHS == 0 {
      assert_eq!(history.last(), Some(report.final_error));
    }
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn converges_on_easy_target() {
    let mut controller = tiny_controller();
    controller.set_learning_rate(0.5).unwrap();
    let report = controller.start(0.1).unwrap().wait().await;
    assert_eq!(report.outcome, RunOutcome::Converged);
    assert!(report.final_error <= 0.1);
    assert!(!controller.is_running());
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn iris_run_with_shuffle_and_scale_ends_idle() {
    let mut controller = iris_controller(7);
    controller
      .set_config(ConfigUpdate::default().shuffle(true).scale(true))
      .unwrap();
    let run = controller.start(0.05).unwrap();
    let history = controller.history();

    let mut last_len = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(1500);
    while !run.is_finished() && tokio::time::Instant::now() < deadline {
      tokio::time::sleep(Duration::from_millis(20)).await;
      let len = history.len();
      assert!(len >= last_len);
      last_len = len;
    }
    run.cancel();
    let report = run.wait().await;
    assert!(!controller.is_running());
    assert!(report.final_error.is_finite() && report.final_error >= 0.0);
    assert_eq!(history.len(), report.epochs / HISTORY_SAMPLE_EPOCHS);
    assert!(history.snapshot().iter().all(|e| e.is_finite() && *e >= 0.0));
    // training scaled a copy, the stored data is untouched
    assert_eq!(controller.data(), &iris::load());
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn data_replaced_during_run_does_not_affect_it() {
    let mut controller = iris_controller(8);
    let run = controller.start(1e-12).unwrap();
    controller
      .set_training_data(vec![vec![0.0; 4]], vec![vec![0.0; 3]])
      .unwrap();
    run.cancel();
    run.wait().await;
    assert_eq!(controller.data().len(), 1);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn reset_clears_history_when_idle() {
    let mut controller = iris_controller(9);
    let run = controller.start(1e-12).unwrap();
    let history = controller.history();
    while history.is_empty() {
      history.wait_for_change(history.version(), Duration::from_millis(100));
    }
    run.cancel();
    run.wait().await;

    let trained = controller.network_snapshot();
    controller.reset().unwrap();
    assert!(history.is_empty());
    assert_ne!(controller.network_snapshot(), trained);
  }

  #[test]
  fn reconfigure_replaces_network_and_clears_history() {
    let mut controller = iris_controller(10);
    controller.history.push(1.0);
    controller.reconfigure_network(&Topology::iris(&[4, 4])).unwrap();
    assert!(controller.history().is_empty());
    assert_eq!(controller.topology().layers, vec![4, 4, 3]);
    assert!(controller.reconfigure_network(&Topology::new(4, vec![])).is_err());
    assert_eq!(controller.topology().layers, vec![4, 4, 3]);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn each_start_gets_a_fresh_cancel_handle() {
    let mut controller = iris_controller(11);
    let first = controller.start(1e-12).unwrap();
    let old = first.cancel_handle();
    first.cancel();
    first.wait().await;
    assert!(old.is_cancelled());

    let second = controller.start(1e-12).unwrap();
    assert!(!second.cancel_handle().is_cancelled());
    controller.cancel();
    assert_eq!(second.wait().await.outcome, RunOutcome::Cancelled);
  }
}
