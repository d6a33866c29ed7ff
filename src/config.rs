use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::curves::CurveShape;

/// Balance policy for growth mediation. Mode 0 applies no penalties, mode 1
/// enables cost scaling only, mode 2 and above also enables the
/// diminishing-returns divisor on growth.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceConfig {
    #[serde(default = "BalanceConfig::default_mode")]
    pub mode: u8,
    /// Multiplier on the diminishing-returns curve output.
    #[serde(default = "BalanceConfig::default_size_gain_penalty")]
    pub size_gain_penalty: f64,
    /// Caps on stolen-attribute pools scale with entity level times this.
    #[serde(default = "BalanceConfig::default_level_limit_modifier")]
    pub level_limit_modifier: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrowthConfig {
    #[serde(default = "GrowthConfig::default_curve_k")]
    pub curve_k: f64,
    #[serde(default = "GrowthConfig::default_curve_n")]
    pub curve_n: f64,
    #[serde(default = "GrowthConfig::default_curve_s")]
    pub curve_s: f64,
}

impl GrowthConfig {
    pub fn reduction_shape(&self) -> CurveShape {
        CurveShape::new(self.curve_k, self.curve_n, self.curve_s)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScaleConfig {
    /// Convergence damping used for new durable records.
    #[serde(default = "ScaleConfig::default_half_life")]
    pub default_half_life: f64,
    /// Ceiling assigned to new durable records.
    #[serde(default = "ScaleConfig::default_max_scale")]
    pub default_max_scale: f64,
    /// Convenience floor callers may pass to shrink helpers.
    #[serde(default = "ScaleConfig::default_min_player_scale")]
    pub min_player_scale: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrabConfig {
    /// Minimum holder/held size ratio for a grab to stay viable.
    #[serde(default = "GrabConfig::default_min_size_ratio")]
    pub min_size_ratio: f64,
    /// Holder stamina floor; below it the grab is force-released.
    #[serde(default = "GrabConfig::default_min_stamina")]
    pub min_stamina: f64,
    /// Holder stamina upkeep per second, divided by the size ratio.
    #[serde(default = "GrabConfig::default_hold_drain")]
    pub hold_drain: f64,
    /// Health/stamina restored per second to a friendly carried entity.
    #[serde(default = "GrabConfig::default_passive_transfer")]
    pub passive_transfer: f64,
    /// Hostile carried entities lose stamina at this multiple of the
    /// friendly restore rate.
    #[serde(default = "GrabConfig::default_hostile_drain_mult")]
    pub hostile_drain_mult: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub balance: BalanceConfig,
    #[serde(default)]
    pub growth: GrowthConfig,
    #[serde(default)]
    pub scale: ScaleConfig,
    #[serde(default)]
    pub grab: GrabConfig,
    /// Seconds between cheap volatile-record refresh passes.
    #[serde(default = "SimConfig::default_refresh_period")]
    pub refresh_period: f64,
}

impl BalanceConfig {
    const fn default_mode() -> u8 {
        0
    }

    fn default_size_gain_penalty() -> f64 {
        1.0
    }

    fn default_level_limit_modifier() -> f64 {
        1.0
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            mode: Self::default_mode(),
            size_gain_penalty: Self::default_size_gain_penalty(),
            level_limit_modifier: Self::default_level_limit_modifier(),
        }
    }
}

impl GrowthConfig {
    fn default_curve_k() -> f64 {
        1.08
    }

    fn default_curve_n() -> f64 {
        0.90
    }

    fn default_curve_s() -> f64 {
        3.0
    }
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            curve_k: Self::default_curve_k(),
            curve_n: Self::default_curve_n(),
            curve_s: Self::default_curve_s(),
        }
    }
}

impl ScaleConfig {
    fn default_half_life() -> f64 {
        0.05
    }

    fn default_max_scale() -> f64 {
        1.0
    }

    fn default_min_player_scale() -> f64 {
        0.12
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            default_half_life: Self::default_half_life(),
            default_max_scale: Self::default_max_scale(),
            min_player_scale: Self::default_min_player_scale(),
        }
    }
}

impl GrabConfig {
    fn default_min_size_ratio() -> f64 {
        8.0
    }

    fn default_min_stamina() -> f64 {
        2.0
    }

    fn default_hold_drain() -> f64 {
        1.2
    }

    fn default_passive_transfer() -> f64 {
        0.04
    }

    fn default_hostile_drain_mult() -> f64 {
        2.0
    }
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            min_size_ratio: Self::default_min_size_ratio(),
            min_stamina: Self::default_min_stamina(),
            hold_drain: Self::default_hold_drain(),
            passive_transfer: Self::default_passive_transfer(),
            hostile_drain_mult: Self::default_hostile_drain_mult(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            balance: BalanceConfig::default(),
            growth: GrowthConfig::default(),
            scale: ScaleConfig::default(),
            grab: GrabConfig::default(),
            refresh_period: Self::default_refresh_period(),
        }
    }
}

impl SimConfig {
    fn default_refresh_period() -> f64 {
        1.0
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}
