//! Device-tier quality profiles.

use super::EntityType;

/// Coarse device capability class chosen by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DeviceTier {
  Low,
  Medium,
  #[default]
  High,
  Ultra,
}

/// Per-level settings crossed with entity presets to build LOD levels.
///
/// All slices have one entry per level and equal length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityProfile {
  pub name: &'static str,
  /// Normalized distance (`distance / (base_size * zoom)`) at which each level
  /// begins. Level 0 starts at 0.
  pub distance_multipliers: &'static [f64],
  /// On-screen size in pixels at or above which each level is used.
  pub screen_sizes: &'static [f64],
  /// Texture edge length per level.
  pub texture_sizes: &'static [u32],
  /// Multiplier on preset geometry detail.
  pub detail_scale: f64,
}

impl QualityProfile {
  pub const LOW: Self = Self {
    name: "low",
    distance_multipliers: &[0.0, 5.0, 15.0],
    screen_sizes: &[300.0, 100.0, 0.0],
    texture_sizes: &[512, 256, 128],
    detail_scale: 0.5,
  };

  pub const MEDIUM: Self = Self {
    name: "medium",
    distance_multipliers: &[0.0, 8.0, 20.0, 50.0],
    screen_sizes: &[250.0, 90.0, 35.0, 0.0],
    texture_sizes: &[1024, 512, 256, 128],
    detail_scale: 0.75,
  };

  pub const HIGH: Self = Self {
    name: "high",
    distance_multipliers: &[0.0, 10.0, 30.0, 80.0],
    screen_sizes: &[200.0, 80.0, 30.0, 0.0],
    texture_sizes: &[2048, 1024, 512, 256],
    detail_scale: 1.0,
  };

  pub const ULTRA: Self = Self {
    name: "ultra",
    distance_multipliers: &[0.0, 15.0, 40.0, 100.0, 200.0],
    screen_sizes: &[150.0, 60.0, 25.0, 10.0, 0.0],
    texture_sizes: &[4096, 2048, 1024, 512, 256],
    detail_scale: 1.5,
  };

  pub const fn for_tier(tier: DeviceTier) -> Self {
    match tier {
      DeviceTier::Low => Self::LOW,
      DeviceTier::Medium => Self::MEDIUM,
      DeviceTier::High => Self::HIGH,
      DeviceTier::Ultra => Self::ULTRA,
    }
  }

  pub fn level_count(&self) -> usize {
    self.distance_multipliers.len()
  }

  /// LOD levels for an entity type under this profile.
  pub fn build_levels(&self, entity_type: EntityType) -> Vec<LodLevel> {
    (0..self.level_count())
      .map(|level| {
        let detail = entity_type.detail_at(level) as f64 * self.detail_scale;
        LodLevel {
          geometry_detail: (detail.round() as u32).max(1),
          texture_size: self.texture_sizes.get(level).copied().unwrap_or(1),
          distance: self.distance_multipliers[level],
          screen_size: self.screen_sizes.get(level).copied().unwrap_or(0.0),
        }
      })
      .collect()
  }
}

impl Default for QualityProfile {
  fn default() -> Self {
    Self::HIGH
  }
}

/// One level of detail of a registered entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodLevel {
  pub geometry_detail: u32,
  pub texture_size: u32,
  /// Normalized start distance before adaptive scaling.
  pub distance: f64,
  /// Minimum on-screen size in pixels.
  pub screen_size: f64,
}
