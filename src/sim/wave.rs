//! Wave conditions
//!
//! A condition triggers once its predicate holds, then becomes ready after
//! its delay. Triggering is sticky: the predicate is not re-checked.

use serde::{Deserialize, Serialize};

use crate::blueprint::{ConditionKind, WaveConditionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConditionState {
    NotTriggered,
    Triggered { at: f64 },
    Ready,
}

/// What the predicates look at
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaveProgress {
    /// Last deployment, or the level start
    pub last_deployment: f64,
    /// Remaining and total ships of the last deployed wave
    pub last_wave: (usize, usize),
    /// Remaining and total ships over every deployed wave
    pub all_waves: (usize, usize),
}

fn fraction_at_most((remaining, total): (usize, usize), percent: f32) -> bool {
    // Nothing deployed: nothing left to wait for
    total == 0 || remaining as f32 / total as f32 <= percent
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveCondition {
    spec: WaveConditionSpec,
    triggered_at: Option<f64>,
}

impl WaveCondition {
    pub fn new(spec: WaveConditionSpec) -> Self {
        Self {
            spec,
            triggered_at: None,
        }
    }

    pub fn state(&self, now: f64) -> ConditionState {
        match self.triggered_at {
            None => ConditionState::NotTriggered,
            Some(at) if now - at >= self.spec.delay as f64 => ConditionState::Ready,
            Some(at) => ConditionState::Triggered { at },
        }
    }

    fn predicate(&self, now: f64, progress: &WaveProgress) -> bool {
        match self.spec.kind {
            ConditionKind::Timer { time } => now - progress.last_deployment >= time as f64,
            ConditionKind::PercentOfLastWave { percent } => fraction_at_most(progress.last_wave, percent),
            ConditionKind::PercentOfAllWaves { percent } => fraction_at_most(progress.all_waves, percent),
        }
    }

    /// Trigger if the predicate holds, and report readiness
    pub fn check(&mut self, now: f64, progress: &WaveProgress) -> bool {
        if self.triggered_at.is_none() && self.predicate(now, progress) {
            log::debug!("Wave condition {:?} triggered at {now:.2}", self.spec.kind);
            self.triggered_at = Some(now);
        }
        self.state(now) == ConditionState::Ready
    }

    pub fn reset(&mut self) {
        self.triggered_at = None;
    }
}
