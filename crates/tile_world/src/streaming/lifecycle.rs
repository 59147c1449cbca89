//! Per-chunk bookkeeping and the lifecycle state machine.

use bevy::log::warn;
use bevy::tasks::Task;

use super::CancelToken;
use crate::coords::ChunkId;
use crate::error::GenerateError;
use crate::region::Region;

/// Lifecycle state of a tracked chunk.
///
/// States only move forward:
/// `AwaitingInstantiation` → `AwaitingGeneration` → `Generated` →
/// `AwaitingDestruction`. Wanting a destroyed chunk again starts over
/// with a fresh [`ChunkLoadInfo`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkState {
  /// Wanted, no region object yet.
  #[default]
  AwaitingInstantiation,
  /// Region exists; generation is queued, running, or failed.
  AwaitingGeneration,
  /// Terrain and meshes are ready; edits are allowed.
  Generated,
  /// Out of the registry, waiting for its task to finish.
  AwaitingDestruction,
}

/// Generation running on the async compute pool.
pub(crate) struct GenerationTask {
  pub task: Task<Result<Region, GenerateError>>,
  pub cancel: CancelToken,
}

impl GenerationTask {
  pub fn is_finished(&self) -> bool {
    self.task.is_finished()
  }
}

/// Scheduler-side record of one tracked chunk.
pub struct ChunkLoadInfo {
  id: ChunkId,
  state: ChunkState,
  /// Present once instantiated, except while its generation task owns it.
  pub(crate) region: Option<Region>,
  pub(crate) generation: Option<GenerationTask>,
  /// Scheduler clock (seconds) of the last refresh that wanted this chunk.
  pub(crate) last_wanted: f64,
  /// Set when generation failed; the chunk is not retried.
  pub(crate) failed: bool,
}

impl ChunkLoadInfo {
  pub(crate) fn new(id: ChunkId, now: f64) -> Self {
    Self {
      id,
      state: ChunkState::AwaitingInstantiation,
      region: None,
      generation: None,
      last_wanted: now,
      failed: false,
    }
  }

  pub fn id(&self) -> ChunkId {
    self.id
  }

  pub fn state(&self) -> ChunkState {
    self.state
  }

  pub fn region(&self) -> Option<&Region> {
    self.region.as_ref()
  }

  pub fn is_generating(&self) -> bool {
    self.generation.is_some()
  }

  pub fn has_failed(&self) -> bool {
    self.failed
  }

  pub fn last_wanted(&self) -> f64 {
    self.last_wanted
  }

  /// Moves to a later state. Backward or repeated moves are rejected.
  pub(crate) fn advance(&mut self, next: ChunkState) -> bool {
    if next <= self.state {
      debug_assert!(false, "chunk {} cannot go from {:?} to {:?}", self.id, self.state, next);
      warn!(
        "Rejected lifecycle transition {:?} -> {:?} for chunk {}",
        self.state, next, self.id
      );
      return false;
    }
    self.state = next;
    true
  }

  /// Whether the destroy pass may release this chunk now.
  pub(crate) fn can_destroy(&self) -> bool {
    self.generation.as_ref().is_none_or(GenerationTask::is_finished)
  }
}
