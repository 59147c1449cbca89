//! Independent rate limits for the four scheduler passes.

use std::time::Duration;

use bevy::time::{Timer, TimerMode};

use crate::config::StreamingConfig;

/// One of the scheduler's passes, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pass {
  Refresh,
  Instantiate,
  Generate,
  Destroy,
}

impl Pass {
  pub const ALL: [Pass; 4] = [Pass::Refresh, Pass::Instantiate, Pass::Generate, Pass::Destroy];
}

/// A repeating timer per pass.
///
/// Each pass runs at most once per [`PassSchedule::tick`], however much
/// time has elapsed; every pass runs on the first tick.
#[derive(Clone, Debug)]
pub struct PassSchedule {
  timers: [Timer; 4],
  started: bool,
}

impl PassSchedule {
  pub fn new(config: &StreamingConfig) -> Self {
    Self {
      timers: [
        repeating(config.refresh_hz),
        repeating(config.instantiate_hz),
        repeating(config.generate_hz),
        repeating(config.destroy_hz),
      ],
      started: false,
    }
  }

  /// Advances every timer and returns the passes that are due.
  pub fn tick(&mut self, delta: Duration) -> Vec<Pass> {
    let first = !self.started;
    self.started = true;

    Pass::ALL
      .into_iter()
      .zip(self.timers.iter_mut())
      .filter_map(|(pass, timer)| {
        timer.tick(delta);
        (first || timer.just_finished()).then_some(pass)
      })
      .collect()
  }
}

fn repeating(hz: f32) -> Timer {
  Timer::from_seconds(1.0 / hz.max(f32::EPSILON), TimerMode::Repeating)
}
