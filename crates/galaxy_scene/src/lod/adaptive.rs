//! Frame-rate feedback on LOD distance thresholds.
//!
//! ```text
//!   record_sample(fps) ──► window ──(every check_interval)──► average
//!
//!   average < target - tolerance  ──► scale *= 1 - step   (downgrade sooner)
//!   average > target + tolerance  ──► scale *= 1 + step   (upgrade later)
//!
//!   step = min(|deviation| / target, max_scale_delta)
//! ```

use std::time::Duration;

use web_time::Instant;

use crate::metrics::RollingWindow;

/// Feedback loop tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptiveConfig {
  pub enabled: bool,
  pub target_fps: f64,
  /// Half-width of the band around `target_fps` that causes no change.
  pub tolerance: f64,
  /// Wall-clock time between evaluations.
  pub check_interval: Duration,
  /// Largest relative scale change per evaluation.
  pub max_scale_delta: f64,
  pub min_scale: f64,
  pub max_scale: f64,
  /// FPS samples kept between evaluations.
  pub sample_window: usize,
}

impl AdaptiveConfig {
  pub const DEFAULT: Self = Self {
    enabled: true,
    target_fps: 60.0,
    tolerance: 5.0,
    check_interval: Duration::from_secs(1),
    max_scale_delta: 0.1,
    min_scale: 0.1,
    max_scale: 2.0,
    sample_window: 120,
  };

  /// Fixed thresholds.
  pub const DISABLED: Self = Self {
    enabled: false,
    ..Self::DEFAULT
  };
}

impl Default for AdaptiveConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Owns the distance-threshold scale.
#[derive(Clone, Debug)]
pub struct AdaptiveController {
  config: AdaptiveConfig,
  samples: RollingWindow<f64>,
  scale: f64,
  last_check: Option<Instant>,
  adjustments: u64,
}

impl AdaptiveController {
  pub fn new(config: AdaptiveConfig) -> Self {
    Self {
      samples: RollingWindow::new(config.sample_window),
      scale: 1.0,
      last_check: None,
      adjustments: 0,
      config,
    }
  }

  pub fn config(&self) -> &AdaptiveConfig {
    &self.config
  }

  /// Current multiplier on every level's start distance.
  pub fn scale(&self) -> f64 {
    self.scale
  }

  /// Evaluations that changed the scale.
  pub fn adjustments(&self) -> u64 {
    self.adjustments
  }

  /// Average of the samples gathered since the last evaluation.
  pub fn average_fps(&self) -> Option<f64> {
    self.samples.mean()
  }

  pub fn record_sample(&mut self, fps: f64) -> Option<f64> {
    self.record_sample_at(fps, Instant::now())
  }

  /// Add a sample and evaluate if `check_interval` has elapsed since the
  /// last evaluation. Returns the new scale when it changed.
  pub fn record_sample_at(&mut self, fps: f64, now: Instant) -> Option<f64> {
    if !self.config.enabled || !fps.is_finite() || fps < 0.0 {
      return None;
    }
    self.samples.push(fps);

    let Some(last_check) = self.last_check else {
      self.last_check = Some(now);
      return None;
    };
    if now.saturating_duration_since(last_check) < self.config.check_interval {
      return None;
    }

    self.last_check = Some(now);
    let average = self.samples.mean()?;
    self.samples.clear();
    self.evaluate(average)
  }

  fn evaluate(&mut self, average: f64) -> Option<f64> {
    let AdaptiveConfig {
      target_fps,
      tolerance,
      max_scale_delta,
      min_scale,
      max_scale,
      ..
    } = self.config;

    let floor = target_fps - tolerance;
    let ceiling = target_fps + tolerance;
    let factor = if average < floor {
      1.0 - ((floor - average) / target_fps).min(max_scale_delta)
    } else if average > ceiling {
      1.0 + ((average - ceiling) / target_fps).min(max_scale_delta)
    } else {
      return None;
    };

    let scale = (self.scale * factor).clamp(min_scale, max_scale);
    if scale == self.scale {
      return None;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(average, from = self.scale, to = scale, "adaptive LOD scale changed");

    self.scale = scale;
    self.adjustments += 1;
    Some(scale)
  }

  /// Back to scale 1.0 with no samples.
  pub fn reset(&mut self) {
    self.samples.clear();
    self.scale = 1.0;
    self.last_check = None;
  }
}

impl Default for AdaptiveController {
  fn default() -> Self {
    Self::new(AdaptiveConfig::DEFAULT)
  }
}
