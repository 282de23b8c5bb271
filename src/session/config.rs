//! Autotracking session configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::TrackExtent;
use crate::solve::RefineConfig;
use crate::store::TrackDirection;
use crate::tracking::{DetectionConfig, HealthConfig};

/// How far the tracker advances per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackingStep {
    /// One frame per tick.
    #[default]
    SingleFrame,
    /// `frame_separation` frames per tick.
    Separation,
}

/// Configuration for an autotracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutotrackConfig {
    /// Feature detection and overlap filtering.
    pub detection: DetectionConfig,

    /// Short-track pruning and jump-cut thresholds.
    pub health: HealthConfig,

    /// Weighted refinement after the first solve.
    pub refine: RefineConfig,

    /// Frames between re-detections, and the tracker extent in
    /// [`TrackingStep::Separation`] mode.
    pub frame_separation: u32,

    pub direction: TrackDirection,

    /// Pick keyframes and solve once the sequence end is reached.
    pub auto_solve: bool,

    /// Refine the solve with reprojection weights.
    pub auto_refine: bool,

    pub tracking_step: TrackingStep,

    /// Detect new features only every `frame_separation` ticks.
    pub redetect_periodically: bool,
}

impl Default for AutotrackConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            health: HealthConfig::default(),
            refine: RefineConfig::default(),
            frame_separation: 5,
            direction: TrackDirection::Forward,
            auto_solve: true,
            auto_refine: true,
            tracking_step: TrackingStep::SingleFrame,
            redetect_periodically: false,
        }
    }
}

impl AutotrackConfig {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        self.detection.validate().context("invalid detection settings")?;
        self.health.validate().context("invalid track health settings")?;
        self.refine.validate().context("invalid refine settings")?;
        if !(1..=100).contains(&self.frame_separation) {
            bail!("frame separation {} outside [1, 100]", self.frame_separation);
        }
        Ok(())
    }

    /// Frames the session advances per tick. Also the length of the
    /// analysis window checked by the health passes.
    pub fn frames_per_tick(&self) -> u32 {
        match self.tracking_step {
            TrackingStep::SingleFrame => 1,
            TrackingStep::Separation => self.frame_separation,
        }
    }

    pub fn track_extent(&self) -> TrackExtent {
        match self.tracking_step {
            TrackingStep::SingleFrame => TrackExtent::OneFrame,
            TrackingStep::Separation => TrackExtent::Frames(self.frame_separation),
        }
    }

    /// Whether feature acquisition runs on tick `iteration`.
    pub fn should_acquire(&self, iteration: u32) -> bool {
        !self.redetect_periodically || iteration % self.frame_separation.max(1) == 0
    }

    /// Refinement settings when auto-refine is enabled.
    pub fn refine_step(&self) -> Option<&RefineConfig> {
        self.auto_refine.then_some(&self.refine)
    }
}
