#[cfg(not(debug_assertions))]
use human_panic::setup_panic;
use tracing::{
  subscriber::{self, SetGlobalDefaultError},
  Level,
};

#[cfg(debug_assertions)]
extern crate better_panic;

// [NOTE] tracing
//
// In code use:
//
// use tracing::{trace, debug, info, warn, error};
//
// `#[tracing::instrument]` opens a span named after the function on every call,
// recording its arguments as fields.

pub fn install_logger(level: Level) -> Result<(), SetGlobalDefaultError> {
  let subscriber = tracing_subscriber::fmt()
    .compact()
    .with_max_level(level)
    .finish();
  subscriber::set_global_default(subscriber)
}

pub fn init_logging(level: Level) -> Result<(), SetGlobalDefaultError> {
  // Human Panic. Only enabled when *not* debugging.
  #[cfg(not(debug_assertions))]
  {
    setup_panic!();
  }

  // Better Panic. Only enabled *when* debugging.
  #[cfg(debug_assertions)]
  {
    better_panic::Settings::debug()
      .most_recent_first(false)
      .lineno_suffix(true)
      .verbosity(better_panic::Verbosity::Full)
      .install();
  }

  install_logger(level)?;

  Ok(())
}

/// Thread-local subscriber for a test; logging stops when the guard drops.
pub fn init_logging_tests() -> subscriber::DefaultGuard {
  let subscriber = tracing_subscriber::fmt()
    .compact()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .finish();
  subscriber::set_default(subscriber)
}
