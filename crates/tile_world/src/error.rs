//! Error types.

use std::io;

use crate::coords::ChunkId;
use crate::streaming::ChunkState;

/// Why a region's generation did not produce geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
  /// The region stopped being wanted. Expected, not a fault.
  Cancelled,
  /// The terrain source or pipeline panicked.
  Panicked(String),
}

impl GenerateError {
  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled)
  }
}

impl std::fmt::Display for GenerateError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Cancelled => write!(f, "generation cancelled"),
      Self::Panicked(msg) => write!(f, "generation panicked: {}", msg),
    }
  }
}

impl std::error::Error for GenerateError {}

/// Edit rejected because the target region cannot be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditError {
  /// No region is tracked for this id.
  NotLoaded(ChunkId),
  /// The region exists but has not finished generating, or is retiring.
  NotReady { id: ChunkId, state: ChunkState },
}

impl std::fmt::Display for EditError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::NotLoaded(id) => write!(f, "region {} is not loaded", id),
      Self::NotReady { id, state } => write!(f, "region {} is not editable in state {:?}", id, state),
    }
  }
}

impl std::error::Error for EditError {}

/// Error loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
  Io(io::Error),
  Parse(toml::de::Error),
  Invalid(String),
}

impl From<io::Error> for ConfigError {
  fn from(err: io::Error) -> Self {
    Self::Io(err)
  }
}

impl From<toml::de::Error> for ConfigError {
  fn from(err: toml::de::Error) -> Self {
    Self::Parse(err)
  }
}

impl std::fmt::Display for ConfigError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Io(e) => write!(f, "I/O error: {}", e),
      Self::Parse(e) => write!(f, "parse error: {}", e),
      Self::Invalid(msg) => write!(f, "invalid config: {}", msg),
    }
  }
}

impl std::error::Error for ConfigError {}
