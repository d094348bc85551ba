use std::{path::PathBuf, time::Duration};

use itertools::Itertools;
use tracing::{info, warn};

use crate::{
  dataset::{iris, read_dataset},
  error::Result,
  model::{Layer, Network, Topology, IRIS_CLASSES, IRIS_INPUTS},
  training::{ConfigUpdate, RunReport, TrainingConfig, TrainingController, HISTORY_SAMPLE_EPOCHS},
};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct TrainParams {
  /// Hidden layer sizes; the 3-neuron output layer is appended.
  pub hidden: Vec<usize>,
  pub config: TrainingConfig,
  pub desired_error: f64,
  /// Cancel the run after this long.
  pub max_duration: Option<Duration>,
  /// Dataset file; the built-in Iris data when absent.
  pub data: Option<PathBuf>,
  /// Inputs to classify once training ends.
  pub tests: Vec<Vec<f64>>,
  pub show_weights: bool,
}

impl Default for TrainParams {
  fn default() -> Self {
    Self {
      hidden: vec![5],
      config: TrainingConfig::default(),
      desired_error: 0.1,
      max_duration: None,
      data: None,
      tests: Vec::new(),
      show_weights: false,
    }
  }
}

#[derive(Debug)]
pub struct TrainSummary {
  pub report: RunReport,
  pub history: Vec<f64>,
  pub predictions: Vec<Vec<f64>>,
}

/// Command line front end: trains a network on Iris while streaming the sampled
/// error history, then tests it on the requested inputs.
pub struct Train {
  params: TrainParams,
}

impl Train {
  pub fn new(params: TrainParams) -> Self {
    Self { params }
  }

  fn controller(&self) -> Result<TrainingController> {
    let params = &self.params;
    let network = Network::new(&Topology::iris(&params.hidden))?;
    let mut controller = TrainingController::new(network);
    controller.set_config(ConfigUpdate {
      learning_rate: Some(params.config.learning_rate),
      shuffle: Some(params.config.shuffle),
      scale: Some(params.config.scale),
    })?;
    let data = match &params.data {
      Some(path) => read_dataset(path, IRIS_INPUTS, IRIS_CLASSES)?,
      None => iris::load(),
    };
    controller.set_dataset(data)?;
    Ok(controller)
  }

  pub async fn run(self) -> Result<TrainSummary> {
    let mut controller = self.controller()?;
    for input in self.params.tests.iter() {
      // fail before training rather than after it
      controller.network_snapshot().compute(input)?;
    }

    let run = controller.start(self.params.desired_error)?;
    let history = controller.history();

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let limit = self.params.max_duration;
    let deadline = async move {
      match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
      }
    };
    tokio::pin!(deadline);

    let mut reported = 0;
    let mut cancelled = false;
    loop {
      tokio::select! {
        _ = ticker.tick() => {}
        _ = &mut ctrl_c, if !cancelled => {
          warn!("interrupted, stopping after the current epoch");
          run.cancel();
          cancelled = true;
        }
        _ = &mut deadline, if !cancelled => {
          warn!("time limit reached, stopping after the current epoch");
          run.cancel();
          cancelled = true;
        }
      }

      for (i, error) in history.since(reported).into_iter().enumerate() {
        let epoch = (reported + i + 1) * HISTORY_SAMPLE_EPOCHS;
        info!(epoch, error, "epoch error");
      }
      reported = history.len();

      if run.is_finished() {
        break;
      }
    }

    let report = run.wait().await;
    info!(
      epochs = report.epochs,
      error = report.final_error,
      outcome = ?report.outcome,
      "training finished"
    );

    if self.params.show_weights {
      log_weights(controller.network_snapshot().layers());
    }

    let mut predictions = Vec::with_capacity(self.params.tests.len());
    for input in self.params.tests.iter() {
      let output = controller.test(input)?;
      info!(
        input = %input.iter().join(" "),
        output = %output.iter().map(|v| format!("{:.4}", v)).join(" "),
        class = predicted_class(&output),
        "test"
      );
      predictions.push(output);
    }

    Ok(TrainSummary {
      report,
      history: history.snapshot(),
      predictions,
    })
  }
}

fn predicted_class(output: &[f64]) -> &'static str {
  output
    .iter()
    .position_max_by(|a, b| a.total_cmp(b))
    .and_then(|i| iris::CLASS_NAMES.get(i))
    .copied()
    .unwrap_or("?")
}

fn log_weights(layers: &[Layer]) {
  for (l, layer) in layers.iter().enumerate() {
    for (n, neuron) in layer.neurons.iter().enumerate() {
      info!(
        layer = l,
        neuron = n,
        inputs = neuron.inputs_count(),
        output = %format!("{:.6}", neuron.output),
        threshold = %format!("{:.6}", neuron.threshold),
        weights = %neuron.weights.iter().map(|w| format!("{:.6}", w)).join(" "),
        "neuron"
      );
    }
  }
}
