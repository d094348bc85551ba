use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const IRIS_INPUTS: usize = 4;
pub const IRIS_CLASSES: usize = 3;

/// Layer sizes of a fully connected network. `layers` lists the hidden layers
/// followed by the output layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
  pub inputs: usize,
  pub layers: Vec<usize>,
}

impl Topology {
  pub fn new(inputs: usize, layers: Vec<usize>) -> Self {
    Self { inputs, layers }
  }

  /// Iris-shaped topology: 4 inputs, the given hidden layers, 3 outputs.
  pub fn iris(hidden: &[usize]) -> Self {
    let mut layers = hidden.to_vec();
    layers.push(IRIS_CLASSES);
    Self::new(IRIS_INPUTS, layers)
  }

  pub fn outputs(&self) -> usize {
    self.layers.last().copied().unwrap_or(0)
  }

  pub fn validate(&self) -> Result<()> {
    if self.inputs == 0 {
      return Err(Error::argument("a network needs at least one input"));
    }
    if self.layers.is_empty() {
      return Err(Error::argument("a network needs at least one layer"));
    }
    if let Some(i) = self.layers.iter().position(|&n| n == 0) {
      return Err(Error::argument(format!("layer {} has no neurons", i)));
    }
    Ok(())
  }
}

impl Default for Topology {
  fn default() -> Self {
    Self::iris(&[5])
  }
}

/// Neuron activation function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
  /// `1 / (1 + e^(-alpha * x))`
  Sigmoid { alpha: f64 },
}

impl Activation {
  pub fn apply(&self, x: f64) -> f64 {
    match *self {
      Activation::Sigmoid { alpha } => 1.0 / (1.0 + (-alpha * x).exp()),
    }
  }

  /// Derivative expressed through the function's own output `y`.
  pub fn derivative_from_output(&self, y: f64) -> f64 {
    match *self {
      Activation::Sigmoid { alpha } => alpha * y * (1.0 - y),
    }
  }
}

impl Default for Activation {
  fn default() -> Self {
    Activation::Sigmoid { alpha: 2.0 }
  }
}
