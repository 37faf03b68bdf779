// THEORY:
// The `SitePolicy` is the single numbering authority for saved segments. Three
// manufacturing sites print physically different sheets, and each one needs its
// own answer to two questions:
//
// 1.  **Page layout**: should this page be cut at its dividers, or kept whole?
// 2.  **Segment decisions**: for every raw segment position on a page, is the
//     segment kept, and under which output index is it saved?
//
// The sites are data, not branches. A `SiteTable` maps a department code to a
// `SiteLayout` variant, and the variants carry their own skip rules. Adding a site
// or a model variant is a table edit. An unknown department is a policy miss and
// falls back to the sequential layout: keep everything, number it naturally.
//
// Indices are assigned per document, page by page, from a running cursor, so two
// kept segments of one document can never share a filename.

use crate::core_modules::composite::CompositeLayout;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Routing metadata that travels with every document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingMeta {
    pub department: String,
    pub process: String,
    pub model: String,
}

impl RoutingMeta {
    pub fn new(department: impl Into<String>, process: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            process: process.into(),
            model: model.into(),
        }
    }
}

/// Whether a page is cut at its dividers or kept as one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLayout {
    Split,
    Whole,
}

/// Model-specific positions that a filtered layout drops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRule {
    pub model: String,
    pub skip_positions: Vec<usize>,
}

/// How one site's documents are laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum SiteLayout {
    /// Every page split, every segment kept, numbered from the start index.
    Sequential,
    /// The first page is a header kept whole. Later pages are split and drop
    /// model-specific positions; the survivors are renumbered contiguously.
    HeaderThenFiltered {
        #[serde(default)]
        skip_rules: Vec<SkipRule>,
        #[serde(default)]
        default_skip: Vec<usize>,
    },
    /// Every page split; each page continues numbering where the previous stopped.
    Chained,
}

impl SiteLayout {
    /// How the saved segments of a finished serial are reassembled.
    pub fn composite_layout(&self) -> CompositeLayout {
        match self {
            SiteLayout::Sequential => CompositeLayout::VerticalStack,
            SiteLayout::HeaderThenFiltered { .. } => CompositeLayout::LeftFixedRightStacked,
            SiteLayout::Chained => CompositeLayout::LeftMultiRightSingle,
        }
    }

    fn page_layout(&self, page_index: usize) -> PageLayout {
        match self {
            SiteLayout::HeaderThenFiltered { .. } if page_index == 0 => PageLayout::Whole,
            _ => PageLayout::Split,
        }
    }

    fn skip_positions(&self, page_index: usize, model: &str) -> &[usize] {
        match self {
            SiteLayout::HeaderThenFiltered {
                skip_rules,
                default_skip,
            } if page_index > 0 => skip_rules
                .iter()
                .find(|rule| rule.model == model)
                .map(|rule| rule.skip_positions.as_slice())
                .unwrap_or(default_skip.as_slice()),
            _ => &[],
        }
    }
}

/// The per-segment verdict of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentDecision {
    Keep { position: usize, output_index: usize },
    Skip { position: usize, rule: SkipReason },
}

impl SegmentDecision {
    pub fn position(&self) -> usize {
        match self {
            SegmentDecision::Keep { position, .. } | SegmentDecision::Skip { position, .. } => *position,
        }
    }

    pub fn output_index(&self) -> Option<usize> {
        match self {
            SegmentDecision::Keep { output_index, .. } => Some(*output_index),
            SegmentDecision::Skip { .. } => None,
        }
    }

    pub fn is_kept(&self) -> bool {
        matches!(self, SegmentDecision::Keep { .. })
    }
}

/// The named rule behind a skipped segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The position is not exposed by the checklist for this model.
    ModelSkipPosition,
}

/// Department code to site layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteTable {
    pub sites: HashMap<String, SiteLayout>,
}

impl Default for SiteTable {
    fn default() -> Self {
        let mut sites = HashMap::new();
        sites.insert("UTA".to_string(), SiteLayout::Sequential);
        sites.insert(
            "UPA".to_string(),
            SiteLayout::HeaderThenFiltered {
                skip_rules: vec![SkipRule {
                    model: "flagship".to_string(),
                    skip_positions: vec![0, 2],
                }],
                default_skip: vec![1, 2],
            },
        );
        sites.insert("UMA".to_string(), SiteLayout::Chained);
        Self { sites }
    }
}

/// Decision-making front end over a `SiteTable`.
#[derive(Debug, Clone, Default)]
pub struct SegmentationPolicy {
    table: SiteTable,
}

static FALLBACK_LAYOUT: SiteLayout = SiteLayout::Sequential;

impl SegmentationPolicy {
    pub fn new(table: SiteTable) -> Self {
        Self { table }
    }

    /// The layout for a department; unknown departments get the sequential layout.
    pub fn site(&self, department: &str) -> &SiteLayout {
        match self.table.sites.get(department) {
            Some(layout) => layout,
            None => {
                debug!("policy miss for department {department:?}, using sequential layout");
                &FALLBACK_LAYOUT
            }
        }
    }

    pub fn page_layout(&self, routing: &RoutingMeta, page_index: usize) -> PageLayout {
        self.site(&routing.department).page_layout(page_index)
    }

    pub fn composite_layout(&self, department: &str) -> CompositeLayout {
        self.site(department).composite_layout()
    }

    /// Decisions for `segment_count` raw segments of one page, numbering kept
    /// segments from `next_index`. Skipped positions do not consume an index.
    pub fn decide_page(
        &self,
        routing: &RoutingMeta,
        page_index: usize,
        segment_count: usize,
        next_index: usize,
    ) -> Vec<SegmentDecision> {
        let skips = self
            .site(&routing.department)
            .skip_positions(page_index, &routing.model);

        let mut skipped_before = 0;
        (0..segment_count)
            .map(|position| {
                if skips.contains(&position) {
                    skipped_before += 1;
                    debug!(
                        "{}/{}: page {page_index} position {position} skipped for model {:?}",
                        routing.department, routing.process, routing.model
                    );
                    SegmentDecision::Skip {
                        position,
                        rule: SkipReason::ModelSkipPosition,
                    }
                } else {
                    SegmentDecision::Keep {
                        position,
                        output_index: next_index + position - skipped_before,
                    }
                }
            })
            .collect()
    }

    /// Decisions for a whole document, given the raw segment count of each page.
    pub fn decide_document(
        &self,
        routing: &RoutingMeta,
        start_index: usize,
        segment_counts: &[usize],
    ) -> Vec<Vec<SegmentDecision>> {
        let mut cursor = start_index;
        segment_counts
            .iter()
            .enumerate()
            .map(|(page_index, &count)| {
                let decisions = self.decide_page(routing, page_index, count, cursor);
                cursor = next_cursor(cursor, &decisions);
                decisions
            })
            .collect()
    }
}

/// One past the highest index the page used, or unchanged if it kept nothing.
pub fn next_cursor(cursor: usize, decisions: &[SegmentDecision]) -> usize {
    decisions
        .iter()
        .filter_map(SegmentDecision::output_index)
        .max()
        .map_or(cursor, |highest| highest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kept(decisions: &[SegmentDecision]) -> Vec<(usize, usize)> {
        decisions
            .iter()
            .filter_map(|d| d.output_index().map(|i| (d.position(), i)))
            .collect()
    }

    #[test]
    fn sequential_site_keeps_everything() {
        let policy = SegmentationPolicy::default();
        let routing = RoutingMeta::new("UTA", "P10", "standard");
        let decisions = policy.decide_page(&routing, 0, 4, 3);
        assert_eq!(kept(&decisions), vec![(0, 3), (1, 4), (2, 5), (3, 6)]);
    }

    #[test]
    fn filtered_site_drops_positions_one_and_two() {
        let policy = SegmentationPolicy::default();
        let routing = RoutingMeta::new("UPA", "P20", "standard");
        let decisions = policy.decide_page(&routing, 1, 6, 0);

        let positions: Vec<usize> = kept(&decisions).iter().map(|&(p, _)| p).collect();
        assert!(!positions.contains(&1));
        assert!(!positions.contains(&2));
        assert_eq!(kept(&decisions), vec![(0, 0), (3, 1), (4, 2), (5, 3)]);
    }

    #[test]
    fn flagship_variant_drops_positions_zero_and_two() {
        let policy = SegmentationPolicy::default();
        let routing = RoutingMeta::new("UPA", "P20", "flagship");
        let decisions = policy.decide_page(&routing, 1, 5, 1);
        assert_eq!(kept(&decisions), vec![(1, 1), (3, 2), (4, 3)]);
    }

    #[test]
    fn filtered_site_keeps_header_whole() {
        let policy = SegmentationPolicy::default();
        let routing = RoutingMeta::new("UPA", "P20", "standard");
        assert_eq!(policy.page_layout(&routing, 0), PageLayout::Whole);
        assert_eq!(policy.page_layout(&routing, 1), PageLayout::Split);

        let pages = policy.decide_document(&routing, 0, &[1, 5]);
        assert_eq!(kept(&pages[0]), vec![(0, 0)]);
        assert_eq!(kept(&pages[1]), vec![(0, 1), (3, 2), (4, 3)]);
    }

    #[test]
    fn chained_site_offsets_second_page() {
        let policy = SegmentationPolicy::default();
        let routing = RoutingMeta::new("UMA", "P30", "standard");
        let pages = policy.decide_document(&routing, 2, &[3, 2]);
        assert_eq!(kept(&pages[0]), vec![(0, 2), (1, 3), (2, 4)]);
        assert_eq!(kept(&pages[1]), vec![(0, 5), (1, 6)]);
    }

    #[test]
    fn unknown_department_falls_back_to_natural_numbering() {
        let policy = SegmentationPolicy::default();
        let routing = RoutingMeta::new("ZZZ", "P99", "anything");
        assert_eq!(policy.page_layout(&routing, 0), PageLayout::Split);
        let decisions = policy.decide_page(&routing, 7, 3, 0);
        assert!(decisions.iter().all(SegmentDecision::is_kept));
        assert_eq!(kept(&decisions), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn each_site_has_its_own_composite() {
        let policy = SegmentationPolicy::default();
        assert_eq!(policy.composite_layout("UTA"), CompositeLayout::VerticalStack);
        assert_eq!(policy.composite_layout("UPA"), CompositeLayout::LeftFixedRightStacked);
        assert_eq!(policy.composite_layout("UMA"), CompositeLayout::LeftMultiRightSingle);
        assert_eq!(policy.composite_layout("ZZZ"), CompositeLayout::VerticalStack);
    }

    #[test]
    fn kept_indices_never_repeat_within_a_document() {
        let mut table = SiteTable::default();
        table.sites.insert(
            "XSK".to_string(),
            SiteLayout::HeaderThenFiltered {
                skip_rules: vec![SkipRule {
                    model: "sparse".to_string(),
                    skip_positions: vec![0, 1, 2, 3, 9],
                }],
                default_skip: vec![4],
            },
        );
        let policy = SegmentationPolicy::new(table);

        for (department, model) in [
            ("UTA", "standard"),
            ("UPA", "standard"),
            ("UPA", "flagship"),
            ("UMA", "standard"),
            ("XSK", "sparse"),
            ("XSK", "other"),
            ("ZZZ", "any"),
        ] {
            let routing = RoutingMeta::new(department, "P1", model);
            let pages = policy.decide_document(&routing, 7, &[1, 4, 0, 6, 3]);
            let indices: Vec<usize> = pages
                .iter()
                .flatten()
                .filter_map(SegmentDecision::output_index)
                .collect();
            assert!(
                indices.windows(2).all(|w| w[0] < w[1]),
                "{department}/{model}: {indices:?}"
            );
            assert!(indices.iter().all(|&i| i >= 7));
        }
    }

    #[test]
    fn empty_page_leaves_cursor_unchanged() {
        assert_eq!(next_cursor(4, &[]), 4);
    }

    #[test]
    fn site_table_reads_from_json() {
        let json = r#"{
            "UPA": { "layout": "header_then_filtered", "default_skip": [2] },
            "UTA": { "layout": "sequential" }
        }"#;
        let table: SiteTable = serde_json::from_str(json).expect("valid table");
        assert_eq!(table.sites.len(), 2);
        assert_eq!(
            table.sites["UPA"],
            SiteLayout::HeaderThenFiltered {
                skip_rules: vec![],
                default_skip: vec![2]
            }
        );
    }
}
