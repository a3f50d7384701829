//! Pipeline stages, their enable flags and their timers.

use std::ops::{Index, IndexMut};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A gated stage of the step pipeline.
///
/// The declaration order is the column order of the timing log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Proximity,
    Physics,
    StrainLimiting,
    Collision,
    Remeshing,
    Separation,
    PopFilter,
    Plasticity,
}

impl Stage {
    pub const COUNT: usize = 8;

    pub const ALL: [Stage; Stage::COUNT] = [
        Stage::Proximity,
        Stage::Physics,
        Stage::StrainLimiting,
        Stage::Collision,
        Stage::Remeshing,
        Stage::Separation,
        Stage::PopFilter,
        Stage::Plasticity,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Proximity => "proximity",
            Stage::Physics => "physics",
            Stage::StrainLimiting => "strain_limiting",
            Stage::Collision => "collision",
            Stage::Remeshing => "remeshing",
            Stage::Separation => "separation",
            Stage::PopFilter => "pop_filter",
            Stage::Plasticity => "plasticity",
        }
    }
}

/// Per-stage enable switches. All stages start enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageFlags {
    enabled: [bool; Stage::COUNT],
}

impl Default for StageFlags {
    fn default() -> Self {
        Self {
            enabled: [true; Stage::COUNT],
        }
    }
}

impl StageFlags {
    /// All stages enabled except `disabled`.
    pub fn without(disabled: &[Stage]) -> Self {
        let mut flags = Self::default();
        for &stage in disabled {
            flags.disable(stage);
        }
        flags
    }

    #[inline]
    pub fn is_enabled(&self, stage: Stage) -> bool {
        self.enabled[stage.index()]
    }

    pub fn enable(&mut self, stage: Stage) {
        self.enabled[stage.index()] = true;
    }

    pub fn disable(&mut self, stage: Stage) {
        self.enabled[stage.index()] = false;
    }
}

/// Accumulating wall-clock timer, bracketed by `tick`/`tock`.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    total: f64,
    started: Option<Instant>,
}

impl Timer {
    pub fn tick(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Adds the time since the last `tick`. Unmatched calls are ignored.
    pub fn tock(&mut self) {
        if let Some(start) = self.started.take() {
            self.total += start.elapsed().as_secs_f64();
        }
    }

    /// Running total in seconds.
    pub fn total(&self) -> f64 {
        self.total
    }
}

/// One timer per stage.
#[derive(Debug, Clone, Default)]
pub struct StageTimers {
    timers: [Timer; Stage::COUNT],
}

impl StageTimers {
    /// Running totals in timing-log column order.
    pub fn totals(&self) -> [f64; Stage::COUNT] {
        std::array::from_fn(|i| self.timers[i].total())
    }
}

impl Index<Stage> for StageTimers {
    type Output = Timer;

    fn index(&self, stage: Stage) -> &Timer {
        &self.timers[stage.index()]
    }
}

impl IndexMut<Stage> for StageTimers {
    fn index_mut(&mut self, stage: Stage) -> &mut Timer {
        &mut self.timers[stage.index()]
    }
}
