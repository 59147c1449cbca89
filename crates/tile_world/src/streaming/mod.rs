//! World streaming scheduler.
//!
//! Keeps the set of regions around a focus point alive. Four passes run at
//! independent rates:
//! - refresh: decide which chunks are wanted, toggle activity bands, retire
//!   stale chunks
//! - instantiate: create the region object for the nearest pending chunk
//! - generate: harvest finished generation tasks, then dispatch new ones up
//!   to the concurrency cap
//! - destroy: release one retired chunk whose task has finished
//!
//! Everything here runs on the caller's thread except region generation,
//! which runs on the [`bevy::tasks::AsyncComputeTaskPool`].

mod cancel;
mod lifecycle;
mod passes;
mod schedule;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bevy::math::Vec2;

pub use cancel::CancelToken;
pub use lifecycle::{ChunkLoadInfo, ChunkState};
pub use schedule::{Pass, PassSchedule};

use crate::config::StreamingConfig;
use crate::coords::{ChunkId, ChunkLayout};
use crate::error::{EditError, GenerateError};
use crate::region::Region;
use crate::terrain::TerrainSource;

/// Something that happened to a chunk, in order of occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamingEvent {
  /// First wanted; a new load info exists.
  Tracked(ChunkId),
  /// Region object created.
  Instantiated(ChunkId),
  /// Generation finished and the region is editable.
  Generated(ChunkId),
  /// Generation failed; see [`StreamingScheduler::drain_errors`].
  GenerationFailed(ChunkId),
  /// Region meshes were rebuilt and need uploading.
  MeshFinalized(ChunkId),
  /// Dropped from the registry and queued for destruction.
  Retired(ChunkId),
  /// Resources released.
  Destroyed(ChunkId),
}

/// A generation failure captured off the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationFailure {
  pub id: ChunkId,
  pub error: GenerateError,
}

/// Snapshot of scheduler occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
  pub tracked: usize,
  pub pending_instantiation: usize,
  pub pending_generation: usize,
  pub in_flight: usize,
  pub generated: usize,
  pub failed: usize,
  pub awaiting_destruction: usize,
}

/// Owns the region registry and drives every chunk's lifecycle.
pub struct StreamingScheduler {
  layout: ChunkLayout,
  config: StreamingConfig,
  terrain: Arc<dyn TerrainSource>,
  registry: HashMap<ChunkId, ChunkLoadInfo>,
  instantiate_queue: Vec<ChunkId>,
  generate_queue: Vec<ChunkId>,
  /// Retired chunks, already out of the registry.
  retiring: Vec<ChunkLoadInfo>,
  /// Running generation tasks; decremented from inside each task.
  in_flight: Arc<AtomicUsize>,
  errors: Vec<GenerationFailure>,
  events: Vec<StreamingEvent>,
  /// Generated since the last [`Self::take_unstitched`]; their seams with
  /// neighbors still need reconciling.
  unstitched: Vec<ChunkId>,
  schedule: PassSchedule,
  /// Seconds of simulated time seen by [`Self::tick`].
  clock: f64,
  focus: Vec2,
}

impl StreamingScheduler {
  pub fn new(layout: ChunkLayout, config: StreamingConfig, terrain: Arc<dyn TerrainSource>) -> Self {
    Self {
      layout,
      schedule: PassSchedule::new(&config),
      config,
      terrain,
      registry: HashMap::new(),
      instantiate_queue: Vec::new(),
      generate_queue: Vec::new(),
      retiring: Vec::new(),
      in_flight: Arc::new(AtomicUsize::new(0)),
      errors: Vec::new(),
      events: Vec::new(),
      unstitched: Vec::new(),
      clock: 0.0,
      focus: Vec2::ZERO,
    }
  }

  /// Advances the clock and runs whichever passes are due.
  pub fn tick(&mut self, delta: Duration, focus: Vec2) {
    self.clock += delta.as_secs_f64();
    self.focus = focus;

    for pass in self.schedule.tick(delta) {
      match pass {
        Pass::Refresh => self.refresh(focus),
        Pass::Instantiate => {
          self.instantiate_next(focus);
        }
        Pass::Generate => {
          self.generate(focus);
        }
        Pass::Destroy => {
          self.destroy_next();
        }
      }
    }
  }

  pub fn layout(&self) -> ChunkLayout {
    self.layout
  }

  pub fn config(&self) -> &StreamingConfig {
    &self.config
  }

  /// Scheduler clock in seconds.
  pub fn clock(&self) -> f64 {
    self.clock
  }

  /// Focus point of the most recent tick or refresh.
  pub fn focus(&self) -> Vec2 {
    self.focus
  }

  pub fn info(&self, id: ChunkId) -> Option<&ChunkLoadInfo> {
    self.registry.get(&id)
  }

  pub fn state(&self, id: ChunkId) -> Option<ChunkState> {
    self.registry.get(&id).map(ChunkLoadInfo::state)
  }

  /// Tracked chunk ids, in no particular order.
  pub fn tracked(&self) -> impl Iterator<Item = ChunkId> + '_ {
    self.registry.keys().copied()
  }

  /// Region of a tracked chunk, if it is resident (not owned by a task).
  pub fn region(&self, id: ChunkId) -> Option<&Region> {
    self.registry.get(&id).and_then(ChunkLoadInfo::region)
  }

  /// Region of a `Generated` chunk, for editing.
  pub(crate) fn ready_region_mut(&mut self, id: ChunkId) -> Result<&mut Region, EditError> {
    let info = self.registry.get_mut(&id).ok_or(EditError::NotLoaded(id))?;
    let state = info.state();
    match info.region.as_mut() {
      Some(region) if state == ChunkState::Generated => Ok(region),
      _ => Err(EditError::NotReady { id, state }),
    }
  }

  /// Region of a `Generated` chunk, or `None`.
  pub fn ready_region(&self, id: ChunkId) -> Option<&Region> {
    let info = self.registry.get(&id)?;
    if info.state() != ChunkState::Generated {
      return None;
    }
    info.region.as_ref()
  }

  pub(crate) fn take_unstitched(&mut self) -> Vec<ChunkId> {
    std::mem::take(&mut self.unstitched)
  }

  /// Records that a region's meshes were rebuilt outside the passes.
  pub(crate) fn note_mesh_finalized(&mut self, id: ChunkId) {
    self.events.push(StreamingEvent::MeshFinalized(id));
  }

  /// Generation tasks currently running.
  pub fn in_flight(&self) -> usize {
    self.in_flight.load(Ordering::Acquire)
  }

  /// Takes captured generation failures.
  pub fn drain_errors(&mut self) -> Vec<GenerationFailure> {
    std::mem::take(&mut self.errors)
  }

  pub fn errors(&self) -> &[GenerationFailure] {
    &self.errors
  }

  /// Takes the event log. Hosts should drain it regularly.
  pub fn drain_events(&mut self) -> Vec<StreamingEvent> {
    std::mem::take(&mut self.events)
  }

  pub fn stats(&self) -> StreamingStats {
    let mut stats = StreamingStats {
      tracked: self.registry.len(),
      pending_instantiation: self.instantiate_queue.len(),
      pending_generation: self.generate_queue.len(),
      in_flight: self.in_flight(),
      awaiting_destruction: self.retiring.len(),
      ..Default::default()
    };
    for info in self.registry.values() {
      if info.state() == ChunkState::Generated {
        stats.generated += 1;
      }
      if info.has_failed() {
        stats.failed += 1;
      }
    }
    stats
  }

  /// Retires every tracked chunk and cancels its generation.
  ///
  /// Retired chunks are released by later destroy passes.
  pub fn shutdown(&mut self) {
    let ids: Vec<ChunkId> = self.registry.keys().copied().collect();
    for id in ids {
      self.retire(id);
    }
  }
}

impl Drop for StreamingScheduler {
  fn drop(&mut self) {
    // Let running tasks stop at their next stage boundary.
    let infos = self.registry.values().chain(self.retiring.iter());
    for generation in infos.filter_map(|info| info.generation.as_ref()) {
      generation.cancel.cancel();
    }
  }
}
