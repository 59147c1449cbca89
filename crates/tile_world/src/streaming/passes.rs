//! The four scheduler passes.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bevy::log::{debug, error, warn};
use bevy::math::Vec2;
use bevy::tasks::{AsyncComputeTaskPool, TaskPool};

use super::lifecycle::GenerationTask;
use super::{
  CancelToken, ChunkLoadInfo, ChunkState, GenerationFailure, StreamingEvent, StreamingScheduler,
};
use crate::coords::{ChunkId, ChunkLayout};
use crate::error::GenerateError;
use crate::region::Region;

/// Holds one slot of the in-flight budget until dropped.
///
/// Lives inside the task body, so the slot is returned when generation ends
/// by any path, including a panic or an abandoned task.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
  fn acquire(counter: &Arc<AtomicUsize>) -> Self {
    counter.fetch_add(1, Ordering::AcqRel);
    Self(counter.clone())
  }
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::AcqRel);
  }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic payload".to_string()
  }
}

/// Whether a chunk is close enough to `focus` to be shown and collide.
fn in_active_band(layout: ChunkLayout, active_distance: f32, id: ChunkId, focus: Vec2) -> bool {
  layout.center(id).distance(focus) <= active_distance
}

/// Removes and returns the queued chunk closest to `focus`.
///
/// Ties break on chunk id so the choice is deterministic.
fn take_nearest(queue: &mut Vec<ChunkId>, layout: ChunkLayout, focus: Vec2) -> Option<ChunkId> {
  let index = queue
    .iter()
    .enumerate()
    .min_by(|(_, a), (_, b)| {
      let da = layout.center(**a).distance_squared(focus);
      let db = layout.center(**b).distance_squared(focus);
      da.total_cmp(&db).then_with(|| a.cmp(b))
    })
    .map(|(i, _)| i)?;
  Some(queue.swap_remove(index))
}

impl StreamingScheduler {
  /// Refresh pass: tracks wanted chunks, applies the activity bands and
  /// retires stale chunks.
  #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
  pub fn refresh(&mut self, focus: Vec2) {
    self.focus = focus;
    let now = self.clock;
    let reach = Vec2::splat(self.config.inactive_distance);
    let min = self.layout.chunk_of(focus - reach);
    let max = self.layout.chunk_of(focus + reach);

    for y in min.y..=max.y {
      for x in min.x..=max.x {
        let id = ChunkId::new(x, y);
        let info = self.registry.entry(id).or_insert_with(|| {
          self.instantiate_queue.push(id);
          self.events.push(StreamingEvent::Tracked(id));
          ChunkLoadInfo::new(id, now)
        });
        info.last_wanted = now;
      }
    }

    let active = self.config.active_distance;
    let stale_after = self.config.stale_after_secs as f64;
    let mut stale = Vec::new();
    for (id, info) in &mut self.registry {
      if now - info.last_wanted > stale_after {
        stale.push(*id);
        continue;
      }
      if info.state() == ChunkState::Generated
        && let Some(region) = info.region.as_mut()
      {
        let near = in_active_band(self.layout, active, *id, focus);
        region.set_visible(near);
        region.set_collidable(near);
      }
    }

    for id in stale {
      self.retire(id);
    }
  }

  /// Moves a chunk out of the registry and queues it for destruction.
  pub(crate) fn retire(&mut self, id: ChunkId) {
    let Some(mut info) = self.registry.remove(&id) else {
      debug_assert!(false, "retiring untracked chunk {id}");
      warn!("Ignoring retire of untracked chunk {}", id);
      return;
    };

    self.instantiate_queue.retain(|queued| *queued != id);
    self.generate_queue.retain(|queued| *queued != id);
    if let Some(generation) = &info.generation {
      generation.cancel.cancel();
    }
    info.advance(ChunkState::AwaitingDestruction);
    if let Some(region) = info.region.as_mut() {
      region.set_visible(false);
      region.set_collidable(false);
    }

    debug!("Retired chunk {}", id);
    self.events.push(StreamingEvent::Retired(id));
    self.retiring.push(info);
  }

  /// Instantiate pass: creates the region for the nearest pending chunk.
  ///
  /// Returns the chunk that was instantiated, if any.
  #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
  pub fn instantiate_next(&mut self, focus: Vec2) -> Option<ChunkId> {
    let id = take_nearest(&mut self.instantiate_queue, self.layout, focus)?;

    let Some(info) = self.registry.get_mut(&id) else {
      debug_assert!(false, "queued chunk {id} has no load info");
      warn!("Skipping instantiation of untracked chunk {}", id);
      return None;
    };
    if info.state() != ChunkState::AwaitingInstantiation {
      debug_assert!(false, "chunk {id} instantiated in state {:?}", info.state());
      warn!("Skipping instantiation of chunk {} in state {:?}", id, info.state());
      return None;
    }

    info.region = Some(Region::new(id, self.layout));
    info.advance(ChunkState::AwaitingGeneration);
    self.generate_queue.push(id);
    self.events.push(StreamingEvent::Instantiated(id));
    Some(id)
  }

  /// Generate pass: harvests finished tasks, then dispatches the nearest
  /// pending chunks while under the concurrency cap.
  ///
  /// Returns the number of tasks dispatched.
  #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
  pub fn generate(&mut self, focus: Vec2) -> usize {
    self.harvest_generation(focus);

    let mut dispatched = 0;
    while self.in_flight() < self.config.max_generation_tasks {
      let Some(id) = take_nearest(&mut self.generate_queue, self.layout, focus) else {
        break;
      };
      if self.dispatch_generation(id) {
        dispatched += 1;
      }
    }

    if dispatched > 0 {
      debug!(
        "Dispatched {} generation tasks ({} in flight)",
        dispatched,
        self.in_flight()
      );
    }
    dispatched
  }

  fn dispatch_generation(&mut self, id: ChunkId) -> bool {
    let Some(info) = self.registry.get_mut(&id) else {
      debug_assert!(false, "queued chunk {id} has no load info");
      return false;
    };
    if info.state() != ChunkState::AwaitingGeneration || info.generation.is_some() {
      debug_assert!(false, "chunk {id} dispatched in state {:?}", info.state());
      warn!("Skipping generation of chunk {} in state {:?}", id, info.state());
      return false;
    }
    let Some(mut region) = info.region.take() else {
      warn!("Chunk {} has no region to generate", id);
      return false;
    };

    let terrain = self.terrain.clone();
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let guard = InFlightGuard::acquire(&self.in_flight);

    let pool = AsyncComputeTaskPool::get_or_init(TaskPool::new);
    let task = pool.spawn(async move {
      let _guard = guard;
      let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        region.generate(terrain.as_ref(), &token)
      }));
      match outcome {
        Ok(Ok(())) => Ok(region),
        Ok(Err(err)) => Err(err),
        Err(payload) => Err(GenerateError::Panicked(panic_message(payload))),
      }
    });

    info.generation = Some(GenerationTask { task, cancel });
    true
  }

  /// Collects finished generation tasks of tracked chunks.
  fn harvest_generation(&mut self, focus: Vec2) {
    let finished: Vec<ChunkId> = self
      .registry
      .iter()
      .filter(|(_, info)| info.generation.as_ref().is_some_and(GenerationTask::is_finished))
      .map(|(id, _)| *id)
      .collect();

    for id in finished {
      let Some(info) = self.registry.get_mut(&id) else {
        continue;
      };
      let Some(generation) = info.generation.take() else {
        continue;
      };

      match bevy::tasks::block_on(generation.task) {
        Ok(mut region) => {
          let near = in_active_band(self.layout, self.config.active_distance, id, focus);
          region.set_visible(near);
          region.set_collidable(near);
          region.finalize_meshes();
          info.region = Some(region);
          info.advance(ChunkState::Generated);
          self.events.push(StreamingEvent::Generated(id));
          self.events.push(StreamingEvent::MeshFinalized(id));
          self.unstitched.push(id);
        }
        Err(GenerateError::Cancelled) => {
          // Tracked chunks are never cancelled; abandon quietly if one was.
          debug!("Generation of chunk {} was cancelled", id);
          info.failed = true;
        }
        Err(err) => {
          error!("Generation of chunk {} failed: {}", id, err);
          info.failed = true;
          self.errors.push(GenerationFailure { id, error: err });
          self.events.push(StreamingEvent::GenerationFailed(id));
        }
      }
    }
  }

  /// Destroy pass: releases one retired chunk whose generation is done
  /// or never started.
  ///
  /// Returns the destroyed chunk, if any.
  #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
  pub fn destroy_next(&mut self) -> Option<ChunkId> {
    let index = self.retiring.iter().position(ChunkLoadInfo::can_destroy)?;
    let mut info = self.retiring.swap_remove(index);
    let id = info.id();

    if let Some(generation) = info.generation.take() {
      // Finished, so this does not block. Only the result is discarded.
      match bevy::tasks::block_on(generation.task) {
        Ok(region) => info.region = Some(region),
        Err(GenerateError::Cancelled) => {}
        Err(err) => debug!("Retired chunk {} had failed generation: {}", id, err),
      }
    }
    if let Some(region) = info.region.as_mut() {
      region.release();
    }

    debug!("Destroyed chunk {}", id);
    self.events.push(StreamingEvent::Destroyed(id));
    Some(id)
  }
}
