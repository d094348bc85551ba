use super::Network;

/// Online gradient descent over the whole dataset, one sample at a time.
#[derive(Debug, Clone, Copy)]
pub struct BackPropagation {
  pub learning_rate: f64,
}

impl BackPropagation {
  pub fn new(learning_rate: f64) -> Self {
    Self { learning_rate }
  }

  /// Runs a single epoch and returns the summed error of all samples.
  ///
  /// Rows must already match the network's input and output widths.
  pub fn run_epoch(&self, network: &mut Network, inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> f64 {
    inputs
      .iter()
      .zip(targets)
      .map(|(x, t)| self.run_sample(network, x, t))
      .sum()
  }

  /// Forward pass, backward pass and weight update for one sample. Returns
  /// half the squared error of the sample.
  pub fn run_sample(&self, network: &mut Network, input: &[f64], target: &[f64]) -> f64 {
    network.forward(input);
    let (error, deltas) = Self::deltas(network, target);
    self.apply(network, input, &deltas);
    error
  }

  fn deltas(network: &Network, target: &[f64]) -> (f64, Vec<Vec<f64>>) {
    let activation = network.activation();
    let layers = network.layers();
    let mut deltas: Vec<Vec<f64>> = vec![Vec::new(); layers.len()];
    let mut error = 0.0;

    let last = layers.len() - 1;
    deltas[last] = layers[last]
      .neurons
      .iter()
      .zip(target)
      .map(|(neuron, t)| {
        let e = t - neuron.output;
        error += e * e;
        e * activation.derivative_from_output(neuron.output)
      })
      .collect();

    for i in (0..last).rev() {
      let next = &layers[i + 1];
      let layer_deltas = layers[i]
        .neurons
        .iter()
        .enumerate()
        .map(|(j, neuron)| {
          let downstream: f64 = next
            .neurons
            .iter()
            .zip(&deltas[i + 1])
            .map(|(n, d)| d * n.weights[j])
            .sum();
          downstream * activation.derivative_from_output(neuron.output)
        })
        .collect();
      deltas[i] = layer_deltas;
    }

    (error / 2.0, deltas)
  }

  fn apply(&self, network: &mut Network, input: &[f64], deltas: &[Vec<f64>]) {
    let lr = self.learning_rate;
    let mut layer_input = input.to_vec();
    for (layer, layer_deltas) in network.layers_mut().iter_mut().zip(deltas) {
      let outputs = layer.outputs();
      for (neuron, delta) in layer.neurons.iter_mut().zip(layer_deltas) {
        for (w, x) in neuron.weights.iter_mut().zip(&layer_input) {
          *w += lr * delta * x;
        }
        neuron.threshold += lr * delta;
      }
      layer_input = outputs;
    }
  }
}
