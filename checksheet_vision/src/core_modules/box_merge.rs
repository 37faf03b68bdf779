// THEORY:
// One physical checkbox usually produces several candidates: the outer and inner
// edge of its printed border both trace as quadrilaterals. The merge collapses
// them with a deliberately simple greedy rule:
//
// - candidates are visited in detection order;
// - each is compared only against the boxes merged so far, first match wins;
// - a match needs both |dx| and |dy| below the threshold;
// - on a match the position becomes the integer midpoint and the size the max.
//
// This is order dependent and not a transitive clustering. Downstream position
// storage was built against exactly this behaviour, so it stays as it is.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoxRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    fn is_near(&self, other: &BoxRect, threshold: i64) -> bool {
        (self.x as i64 - other.x as i64).abs() < threshold
            && (self.y as i64 - other.y as i64).abs() < threshold
    }

    fn absorb(&self, other: &BoxRect) -> BoxRect {
        BoxRect {
            x: (self.x + other.x) / 2,
            y: (self.y + other.y) / 2,
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}

/// Greedy, order-dependent merge of nearby boxes.
pub fn merge_boxes(boxes: impl IntoIterator<Item = BoxRect>, threshold: i64) -> Vec<BoxRect> {
    let mut merged: Vec<BoxRect> = Vec::new();
    for candidate in boxes {
        match merged.iter_mut().find(|m| candidate.is_near(m, threshold)) {
            Some(existing) => *existing = candidate.absorb(existing),
            None => merged.push(candidate),
        }
    }
    merged
}
