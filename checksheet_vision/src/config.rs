// THEORY:
// All hand-tuned thresholds of the engine live here, grouped by the stage that
// reads them. Every section has a `Default` carrying the values the sheets were
// tuned against, and every section is optional in a JSON config file, so a
// deployment only writes down what it overrides.

use crate::core_modules::exclusion::ExclusionTable;
use crate::core_modules::site_policy::SiteTable;
use crate::error::{Result, SheetError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level configuration for the whole engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub binarize: BinarizeConfig,
    pub divider: DividerConfig,
    pub checkbox: CheckboxConfig,
    pub composite: CompositeConfig,
    pub sites: SiteTable,
    pub exclusion_zones: ExclusionTable,
}

impl EngineConfig {
    /// Reads a JSON config file. Missing sections keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| SheetError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&data)
            .map_err(|e| SheetError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn from_json(data: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BinarizeConfig {
    /// Gray samples at or below this value are ink.
    pub threshold: u8,
}

impl Default for BinarizeConfig {
    fn default() -> Self {
        Self { threshold: 200 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DividerConfig {
    /// Fraction of the full page width a row must be inked to count as dense.
    pub threshold_ratio: f64,
    /// Largest gap, in rows, that still joins two dense rows into one cluster.
    pub proximity_distance: u32,
    /// Thinnest cluster accepted as a divider.
    pub min_group_thickness: u32,
    /// Thickest cluster accepted as a divider. Anything above is a solid block.
    pub max_group_thickness: u32,
    /// Fraction of the content width a divider's own ink must span.
    pub min_span_ratio: f64,
}

impl Default for DividerConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: 0.4,
            proximity_distance: 10,
            min_group_thickness: 20,
            max_group_thickness: 40,
            min_span_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckboxConfig {
    /// Gaussian sigma equivalent to a 3x3 kernel.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon approximation tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_side: u32,
    pub max_side: u32,
    /// Candidates whose interior intensity std-dev reaches this are printed content.
    pub max_uniformity_std: f64,
    /// Pixels peeled off the filled contour before measuring uniformity, so the
    /// printed border and the edge overshoot stay out of the statistics.
    pub interior_inset: u8,
    /// Boxes closer than this on both axes are one physical checkbox.
    pub merge_threshold: i64,
}

impl Default for CheckboxConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 0.8,
            canny_low: 30.0,
            canny_high: 100.0,
            approx_epsilon_ratio: 0.04,
            min_aspect: 0.9,
            max_aspect: 1.13,
            min_side: 7,
            max_side: 25,
            max_uniformity_std: 40.0,
            interior_inset: 3,
            merge_threshold: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    pub jpeg_quality: u8,
    /// Width for the vertical stack. `None` uses the widest input.
    pub target_width: Option<u32>,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 95,
            target_width: None,
        }
    }
}
