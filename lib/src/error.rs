use thiserror::Error;

/// Errors surfaced synchronously by the controller and its collaborators.
///
/// A failing call never leaves partial state behind: every check runs before the
/// first mutation.
#[derive(Debug, Error)]
pub enum Error {
  /// An operation that requires an idle controller was issued during a run
  /// (or `start` was issued without an async runtime to run on).
  #[error("invalid state: {0}")]
  InvalidState(String),

  /// Dataset, topology or test vector shape does not fit the network.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("line {line}: {message}")]
  Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
  pub(crate) fn state(message: impl Into<String>) -> Self {
    Error::InvalidState(message.into())
  }

  pub(crate) fn argument(message: impl Into<String>) -> Self {
    Error::InvalidArgument(message.into())
  }
}
