pub mod iris;

use std::path::Path;

use itertools::Itertools;

use crate::error::{Error, Result};

/// Rows of network inputs paired index by index with expected outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
  pub inputs: Vec<Vec<f64>>,
  pub targets: Vec<Vec<f64>>,
}

impl Dataset {
  pub fn new(inputs: Vec<Vec<f64>>, targets: Vec<Vec<f64>>) -> Self {
    Self { inputs, targets }
  }

  pub fn len(&self) -> usize {
    self.inputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inputs.is_empty()
  }

  /// Checks row counts and that every row has the given width.
  pub fn validate(&self, inputs_count: usize, outputs_count: usize) -> Result<()> {
    if self.inputs.len() != self.targets.len() {
      return Err(Error::argument(format!(
        "{} input rows but {} target rows",
        self.inputs.len(),
        self.targets.len()
      )));
    }
    if self.inputs.is_empty() {
      return Err(Error::argument("dataset has no rows"));
    }
    if let Some((i, row)) = self.inputs.iter().find_position(|r| r.len() != inputs_count) {
      return Err(Error::argument(format!(
        "input row {} has {} values, the network takes {}",
        i,
        row.len(),
        inputs_count
      )));
    }
    if let Some((i, row)) = self.targets.iter().find_position(|r| r.len() != outputs_count) {
      return Err(Error::argument(format!(
        "target row {} has {} values, the network produces {}",
        i,
        row.len(),
        outputs_count
      )));
    }
    Ok(())
  }
}

/// One row per label with a single `1.0` at the label's index.
pub fn one_hot(labels: &[usize], classes: usize) -> Vec<Vec<f64>> {
  labels
    .iter()
    .map(|&label| (0..classes).map(|c| if c == label { 1.0 } else { 0.0 }).collect())
    .collect()
}

/// Parses whitespace separated rows of `features` values followed by a 0-based
/// class label. Blank lines and lines starting with `#` are skipped.
pub fn parse_dataset(content: &str, features: usize, classes: usize) -> Result<Dataset> {
  let mut inputs = Vec::new();
  let mut labels = Vec::new();
  for (i, line) in content.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    let parse_err = |message: String| Error::Parse { line: i + 1, message };
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != features + 1 {
      return Err(parse_err(format!(
        "expected {} values, found {}",
        features + 1,
        parts.len()
      )));
    }
    let row = parts[..features]
      .iter()
      .map(|v| v.parse::<f64>().map_err(|e| parse_err(format!("{:?}: {}", v, e))))
      .collect::<Result<Vec<f64>>>()?;
    let label = parts[features]
      .parse::<usize>()
      .map_err(|e| parse_err(format!("label {:?}: {}", parts[features], e)))?;
    if label >= classes {
      return Err(parse_err(format!("label {} out of range 0..{}", label, classes)));
    }
    inputs.push(row);
    labels.push(label);
  }
  Ok(Dataset::new(inputs, one_hot(&labels, classes)))
}

pub fn read_dataset(path: &Path, features: usize, classes: usize) -> Result<Dataset> {
  let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
    path: path.display().to_string(),
    source,
  })?;
  parse_dataset(&content, features, classes)
}
