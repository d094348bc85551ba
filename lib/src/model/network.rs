use rand::Rng;

use super::{Activation, Topology};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Neuron {
  pub weights: Vec<f64>,
  pub threshold: f64,
  /// Output of the most recent forward pass.
  pub output: f64,
}

impl Neuron {
  fn new<R: Rng + ?Sized>(inputs: usize, rng: &mut R) -> Self {
    let mut neuron = Self {
      weights: vec![0.0; inputs],
      threshold: 0.0,
      output: 0.0,
    };
    neuron.randomize(rng);
    neuron
  }

  pub fn inputs_count(&self) -> usize {
    self.weights.len()
  }

  fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    for w in self.weights.iter_mut() {
      *w = rng.gen::<f64>();
    }
    self.threshold = rng.gen::<f64>();
  }

  fn weighted_sum(&self, input: &[f64]) -> f64 {
    self
      .weights
      .iter()
      .zip(input)
      .map(|(w, x)| w * x)
      .sum::<f64>()
      + self.threshold
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
  pub neurons: Vec<Neuron>,
}

impl Layer {
  pub fn inputs_count(&self) -> usize {
    self.neurons.first().map(Neuron::inputs_count).unwrap_or(0)
  }

  pub fn outputs(&self) -> Vec<f64> {
    self.neurons.iter().map(|n| n.output).collect()
  }
}

/// Fully connected feed-forward network.
///
/// Layer `i + 1` takes as many inputs as layer `i` has neurons; the first layer
/// takes `inputs_count` inputs. The structure is fixed once built, only weights,
/// thresholds and cached outputs change.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
  inputs_count: usize,
  activation: Activation,
  layers: Vec<Layer>,
}

impl Network {
  pub fn new(topology: &Topology) -> Result<Self> {
    Self::with_rng(topology, Activation::default(), &mut rand::thread_rng())
  }

  pub fn with_rng<R: Rng + ?Sized>(
    topology: &Topology,
    activation: Activation,
    rng: &mut R,
  ) -> Result<Self> {
    topology.validate()?;
    let mut inputs = topology.inputs;
    let mut layers = Vec::with_capacity(topology.layers.len());
    for &size in topology.layers.iter() {
      layers.push(Layer {
        neurons: (0..size).map(|_| Neuron::new(inputs, rng)).collect(),
      });
      inputs = size;
    }
    Ok(Self {
      inputs_count: topology.inputs,
      activation,
      layers,
    })
  }

  pub fn inputs_count(&self) -> usize {
    self.inputs_count
  }

  pub fn outputs_count(&self) -> usize {
    self.layers.last().map(|l| l.neurons.len()).unwrap_or(0)
  }

  pub fn activation(&self) -> Activation {
    self.activation
  }

  pub fn layers(&self) -> &[Layer] {
    &self.layers
  }

  pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
    &mut self.layers
  }

  pub fn topology(&self) -> Topology {
    Topology::new(
      self.inputs_count,
      self.layers.iter().map(|l| l.neurons.len()).collect(),
    )
  }

  pub fn randomize(&mut self) {
    self.randomize_with(&mut rand::thread_rng());
  }

  pub fn randomize_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    for neuron in self.layers.iter_mut().flat_map(|l| l.neurons.iter_mut()) {
      neuron.randomize(rng);
      neuron.output = 0.0;
    }
  }

  /// Forward pass. Every neuron caches its output for later inspection and for
  /// the backward pass.
  pub fn compute(&mut self, input: &[f64]) -> Result<Vec<f64>> {
    if input.len() != self.inputs_count {
      return Err(Error::argument(format!(
        "expected {} inputs, got {}",
        self.inputs_count,
        input.len()
      )));
    }
    Ok(self.forward(input))
  }

  /// Forward pass without the width check. Callers guarantee
  /// `input.len() == inputs_count`.
  pub(crate) fn forward(&mut self, input: &[f64]) -> Vec<f64> {
    let activation = self.activation;
    let mut current = input.to_vec();
    for layer in self.layers.iter_mut() {
      for neuron in layer.neurons.iter_mut() {
        neuron.output = activation.apply(neuron.weighted_sum(&current));
      }
      current = layer.outputs();
    }
    current
  }
}
