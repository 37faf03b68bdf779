// THEORY:
// Exclusion zones are rectangles of a sheet where printed artifacts (approval
// stamps, company logos, revision boxes) look like checkboxes to the detector.
// They are a static table keyed by (department, process, model) so the detector
// itself never carries a site-specific literal. An entry with `process` or
// `model` left out matches any value.

use crate::core_modules::site_policy::RoutingMeta;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ZoneRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Half-open containment: `[x, x + width) x [y, y + height)`.
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && px < self.x.saturating_add(self.width)
            && py >= self.y
            && py < self.y.saturating_add(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    pub department: String,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub zones: Vec<ZoneRect>,
}

impl ExclusionEntry {
    fn matches(&self, routing: &RoutingMeta) -> bool {
        self.department == routing.department
            && self.process.as_deref().is_none_or(|p| p == routing.process)
            && self.model.as_deref().is_none_or(|m| m == routing.model)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionTable {
    pub entries: Vec<ExclusionEntry>,
}

impl Default for ExclusionTable {
    fn default() -> Self {
        Self {
            entries: vec![
                // Quality-approval stamp printed on flagship inspection pages.
                ExclusionEntry {
                    department: "UPA".to_string(),
                    process: Some("INSP".to_string()),
                    model: Some("flagship".to_string()),
                    zones: vec![ZoneRect::new(620, 10, 180, 90)],
                },
                // Company logo block in the sheet header.
                ExclusionEntry {
                    department: "UMA".to_string(),
                    process: None,
                    model: None,
                    zones: vec![ZoneRect::new(0, 0, 150, 70)],
                },
            ],
        }
    }
}

impl ExclusionTable {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// All zones active for a routing context.
    pub fn zones_for(&self, routing: &RoutingMeta) -> Vec<ZoneRect> {
        self.entries
            .iter()
            .filter(|entry| entry.matches(routing))
            .flat_map(|entry| entry.zones.iter().copied())
            .collect()
    }
}
