use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings the controller applies to every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
  pub learning_rate: f64,
  /// Reorder rows every epoch.
  pub shuffle: bool,
  /// Min-max normalize input columns before the first epoch.
  pub scale: bool,
}

impl Default for TrainingConfig {
  fn default() -> Self {
    Self {
      learning_rate: 0.1,
      shuffle: false,
      scale: false,
    }
  }
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
  pub learning_rate: Option<f64>,
  pub shuffle: Option<bool>,
  pub scale: Option<bool>,
}

impl ConfigUpdate {
  pub fn learning_rate(mut self, rate: f64) -> Self {
    self.learning_rate = Some(rate);
    self
  }

  pub fn shuffle(mut self, shuffle: bool) -> Self {
    self.shuffle = Some(shuffle);
    self
  }

  pub fn scale(mut self, scale: bool) -> Self {
    self.scale = Some(scale);
    self
  }
}

impl TrainingConfig {
  /// Returns the config with the update applied, or an error without applying
  /// anything.
  pub fn updated(&self, update: &ConfigUpdate) -> Result<Self> {
    let learning_rate = update.learning_rate.unwrap_or(self.learning_rate);
    validate_learning_rate(learning_rate)?;
    Ok(Self {
      learning_rate,
      shuffle: update.shuffle.unwrap_or(self.shuffle),
      scale: update.scale.unwrap_or(self.scale),
    })
  }
}

pub(crate) fn validate_learning_rate(rate: f64) -> Result<()> {
  if rate.is_finite() && rate > 0.0 {
    Ok(())
  } else {
    Err(Error::argument(format!("learning rate must be positive, got {}", rate)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let config = TrainingConfig::default();
    assert!((config.learning_rate - 0.1).abs() < 1e-12);
    assert!(!config.shuffle);
    assert!(!config.scale);
  }

  #[test]
  fn update_keeps_unset_fields() {
    let config = TrainingConfig::default();
    let next = config.updated(&ConfigUpdate::default().scale(true)).unwrap();
    assert_eq!(
      next,
      TrainingConfig {
        scale: true,
        ..config
      }
    );
  }

  #[test]
  fn update_rejects_bad_rate() {
    let config = TrainingConfig::default();
    for rate in [0.0, -0.5, f64::NAN, f64::INFINITY] {
      let update = ConfigUpdate::default().learning_rate(rate).shuffle(true);
      assert!(matches!(config.updated(&update), Err(Error::InvalidArgument(_))));
    }
  }
}
