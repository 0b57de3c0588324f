//! Iteration-driven schedules: stages, training phases and cadences.

pub use burn::config::Config;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The parameter group a run refines after pretraining.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    /// Refining the geometry from rendered normals.
    GeometryModeling,
    /// Refining the material and the light from shaded renders.
    #[default]
    AppearanceModeling,
}

/// The fidelity regime of an iteration.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Stage {
    Pretrain,
    Coarse,
    Fine,
}

/// The optimization state of an iteration.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum TrainingPhase {
    Pretrain,
    GeometryRefine,
    AppearanceRefine,
}

/// The optimizer group receiving the update of an iteration.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OptimizerHandle {
    Geometry,
    Appearance,
}

#[derive(Config, Copy, Debug, PartialEq)]
pub struct PhaseSchedule {
    /// The iteration at which the fine stage begins.
    #[config(default = "1000")]
    pub coarse_iteration: u64,

    #[config(default = "TrainingMode::AppearanceModeling")]
    pub mode: TrainingMode,

    /// The count of leading iterations fitting the initial shape.
    #[config(default = "0")]
    pub pretrain_iterations: u64,
}

/// An iteration cadence in `[start, end)` hitting every `step` iterations.
#[derive(Config, Copy, Debug, PartialEq)]
pub struct IterationRange {
    pub start: u64,
    pub end: u64,
    pub step: u64,
}

/// Selecting the optimizer which steps in `phase`.
///
/// Pretraining and geometry refinement update the geometry, appearance
/// refinement updates the material and the light.
#[inline]
pub const fn select_optimizer(phase: TrainingPhase) -> OptimizerHandle {
    match phase {
        TrainingPhase::Pretrain | TrainingPhase::GeometryRefine => {
            OptimizerHandle::Geometry
        },
        TrainingPhase::AppearanceRefine => OptimizerHandle::Appearance,
    }
}

impl PhaseSchedule {
    pub fn stage(
        &self,
        iteration: u64,
    ) -> Stage {
        if iteration < self.pretrain_iterations {
            Stage::Pretrain
        } else if iteration < self.coarse_iteration {
            Stage::Coarse
        } else {
            Stage::Fine
        }
    }

    pub fn phase(
        &self,
        iteration: u64,
    ) -> TrainingPhase {
        match (self.stage(iteration), self.mode) {
            (Stage::Pretrain, _) => TrainingPhase::Pretrain,
            (_, TrainingMode::GeometryModeling) => TrainingPhase::GeometryRefine,
            (_, TrainingMode::AppearanceModeling) => {
                TrainingPhase::AppearanceRefine
            },
        }
    }
}

impl IterationRange {
    /// Hitting every `step` iterations from zero, or never if `step` is zero.
    #[inline]
    pub fn every(step: u64) -> Self {
        Self {
            step,
            ..Default::default()
        }
    }

    pub fn has(
        &self,
        iteration: u64,
    ) -> bool {
        self.step != 0
            && iteration >= self.start
            && iteration < self.end
            && (iteration - self.start) % self.step == 0
    }
}

impl Default for PhaseSchedule {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Default for IterationRange {
    #[inline]
    fn default() -> Self {
        Self {
            start: 0,
            end: u64::MAX,
            step: 1,
        }
    }
}

impl TrainingMode {
    /// The name used in preview file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GeometryModeling => "geometry_modeling",
            Self::AppearanceModeling => "appearance_modeling",
        }
    }
}

impl fmt::Display for TrainingMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn has() {
        use super::*;

        let range = IterationRange::new(1, 9, 2);

        (0..11).for_each(|i| {
            let target = i % 2 != 0 && i < 9;
            let output = range.has(i);
            assert_eq!(output, target, "range.has({i})");
        });
    }

    #[test]
    fn every_zero_never_hits() {
        use super::*;

        let range = IterationRange::every(0);
        assert!((0..100).all(|i| !range.has(i)));

        let range = IterationRange::every(25);
        let hits = (0..100).filter(|i| range.has(*i)).collect::<Vec<_>>();
        assert_eq!(hits, [0, 25, 50, 75]);
    }

    #[test]
    fn stage_and_phase_are_monotonic() {
        use super::*;

        let schedule = PhaseSchedule::new()
            .with_pretrain_iterations(3)
            .with_coarse_iteration(6)
            .with_mode(TrainingMode::GeometryModeling);

        let stages = (0..10).map(|i| schedule.stage(i)).collect::<Vec<_>>();
        assert!(stages.windows(2).all(|w| w[0] <= w[1]), "{stages:?}");
        assert_eq!(stages[2], Stage::Pretrain);
        assert_eq!(stages[3], Stage::Coarse);
        assert_eq!(stages[6], Stage::Fine);

        let phases = (0..10).map(|i| schedule.phase(i)).collect::<Vec<_>>();
        assert!(phases.windows(2).all(|w| w[0] <= w[1]), "{phases:?}");
        assert_eq!(phases[0], TrainingPhase::Pretrain);
        assert_eq!(phases[9], TrainingPhase::GeometryRefine);

        let schedule = schedule.with_mode(TrainingMode::AppearanceModeling);
        assert_eq!(schedule.phase(2), TrainingPhase::Pretrain);
        assert_eq!(schedule.phase(3), TrainingPhase::AppearanceRefine);
    }

    #[test]
    fn select_optimizer_exclusive() {
        use super::*;

        assert_eq!(
            select_optimizer(TrainingPhase::Pretrain),
            OptimizerHandle::Geometry
        );
        assert_eq!(
            select_optimizer(TrainingPhase::GeometryRefine),
            OptimizerHandle::Geometry
        );
        assert_eq!(
            select_optimizer(TrainingPhase::AppearanceRefine),
            OptimizerHandle::Appearance
        );
    }

    #[test]
    fn training_mode_serde() {
        use super::*;

        let mode: TrainingMode =
            serde_json::from_str("\"geometry_modeling\"").unwrap();
        assert_eq!(mode, TrainingMode::GeometryModeling);
        assert_eq!(mode.to_string(), "geometry_modeling");
    }
}
