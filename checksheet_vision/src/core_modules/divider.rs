// THEORY:
// The `Divider` engine finds the printed rules that separate one process step from
// the next on an inspection sheet, and turns them into a `SplitPlan`.
//
// Algorithm:
// 1.  **Dense Rows**: a row is dense when its ink sum exceeds
//     `width * 255 * threshold_ratio`.
// 2.  **Clustering**: ascending dense rows are grouped while the gap between
//     neighbours stays within `proximity_distance`. Each group is a candidate rule.
// 3.  **Validation**: a candidate becomes a divider only if its thickness sits in the
//     configured band AND the ink of its own row band spans at least
//     `min_span_ratio` of the page content width. The first test drops specks and
//     hairlines, the second drops photographs, stamps and partial underlines.
// 4.  **Plan**: the start row of each divider is a cut. The plan is
//     `[0, cuts..., height]`, sorted and deduplicated.
//
// Every rejected candidate is returned with the rule that fired.

use crate::config::DividerConfig;
use crate::core_modules::projection::projection::{self, Margins};
use image::GrayImage;
use log::debug;

/// A maximal run of dense rows. `span_width` is filled in once the cluster
/// has been measured against the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DividerCluster {
    pub start_row: u32,
    pub end_row: u32,
    pub span_width: Option<u32>,
}

impl DividerCluster {
    pub fn thickness(&self) -> u32 {
        self.end_row - self.start_row + 1
    }
}

/// Why a candidate cluster did not become a divider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DividerRejection {
    Thickness {
        cluster: DividerCluster,
        min: u32,
        max: u32,
    },
    SpanWidth {
        cluster: DividerCluster,
        span_width: u32,
        required: f64,
    },
}

/// Ordered row boundaries. Consecutive pairs are the segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    boundaries: Vec<u32>,
}

impl SplitPlan {
    /// Builds `[0, cuts..., height]`, sorted and deduplicated. Cuts outside the
    /// image are clamped to its height.
    pub fn new(height: u32, cuts: impl IntoIterator<Item = u32>) -> Self {
        let mut boundaries: Vec<u32> = std::iter::once(0)
            .chain(cuts.into_iter().map(|c| c.min(height)))
            .chain(std::iter::once(height))
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();
        Self { boundaries }
    }

    /// One segment spanning the whole page.
    pub fn whole(height: u32) -> Self {
        Self::new(height, std::iter::empty())
    }

    pub fn boundaries(&self) -> &[u32] {
        &self.boundaries
    }

    /// `(start, end)` row ranges, end exclusive.
    pub fn segments(&self) -> Vec<(u32, u32)> {
        self.boundaries.windows(2).map(|w| (w[0], w[1])).collect()
    }

    pub fn len(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the engine learned about one page.
#[derive(Debug, Clone)]
pub struct DividerAnalysis {
    pub margins: Margins,
    pub dense_rows: Vec<u32>,
    pub dividers: Vec<DividerCluster>,
    pub rejections: Vec<DividerRejection>,
    pub plan: SplitPlan,
}

/// Rows whose profile value exceeds `width * 255 * threshold_ratio`, ascending.
pub fn dense_rows(profile: &[u64], width: u32, threshold_ratio: f64) -> Vec<u32> {
    let row_threshold = width as f64 * 255.0 * threshold_ratio;
    profile
        .iter()
        .enumerate()
        .filter(|&(_, &value)| value as f64 > row_threshold)
        .map(|(row, _)| row as u32)
        .collect()
}

/// Groups ascending rows; a gap larger than `proximity_distance` starts a new cluster.
pub fn cluster_rows(rows: &[u32], proximity_distance: u32) -> Vec<DividerCluster> {
    let mut clusters: Vec<DividerCluster> = Vec::new();
    for &row in rows {
        match clusters.last_mut() {
            Some(current) if row - current.end_row <= proximity_distance => {
                current.end_row = row;
            }
            _ => clusters.push(DividerCluster {
                start_row: row,
                end_row: row,
                span_width: None,
            }),
        }
    }
    clusters
}

/// Width of the ink inside the cluster's own row band.
pub fn measure_span(mask: &GrayImage, cluster: &DividerCluster) -> u32 {
    let band = projection::column_profile_in_rows(mask, cluster.start_row, cluster.end_row + 1);
    projection::ink_extent(&band)
        .map(|(left, right)| right - left)
        .unwrap_or(0)
}

/// Applies the thickness band and the span-width test to every cluster.
pub fn validate_clusters(
    mask: &GrayImage,
    clusters: &[DividerCluster],
    content_width: u32,
    config: &DividerConfig,
) -> (Vec<DividerCluster>, Vec<DividerRejection>) {
    let required = config.min_span_ratio * content_width as f64;
    let mut dividers = Vec::new();
    let mut rejections = Vec::new();

    for cluster in clusters {
        let thickness = cluster.thickness();
        if thickness < config.min_group_thickness || thickness > config.max_group_thickness {
            debug!(
                "divider candidate rows {}..={} rejected: thickness {} outside [{}, {}]",
                cluster.start_row,
                cluster.end_row,
                thickness,
                config.min_group_thickness,
                config.max_group_thickness
            );
            rejections.push(DividerRejection::Thickness {
                cluster: *cluster,
                min: config.min_group_thickness,
                max: config.max_group_thickness,
            });
            continue;
        }

        let span_width = measure_span(mask, cluster);
        let measured = DividerCluster {
            span_width: Some(span_width),
            ..*cluster
        };
        if (span_width as f64) < required {
            debug!(
                "divider candidate rows {}..={} rejected: span width {} below {:.1}",
                cluster.start_row, cluster.end_row, span_width, required
            );
            rejections.push(DividerRejection::SpanWidth {
                cluster: measured,
                span_width,
                required,
            });
            continue;
        }

        dividers.push(measured);
    }

    (dividers, rejections)
}

/// Runs the full engine over one binarized page.
pub fn analyze(mask: &GrayImage, config: &DividerConfig) -> DividerAnalysis {
    let (width, height) = mask.dimensions();

    // --- 1. Projections & Margins ---
    let rows = projection::row_profile(mask);
    let margins = projection::margins(&projection::column_profile(mask));

    // --- 2. Dense Rows ---
    let dense = dense_rows(&rows, width, config.threshold_ratio);
    if dense.is_empty() {
        debug!("no dense rows on {width}x{height} page, keeping it whole");
        return DividerAnalysis {
            margins,
            dense_rows: dense,
            dividers: Vec::new(),
            rejections: Vec::new(),
            plan: SplitPlan::whole(height),
        };
    }

    // --- 3. Clustering & Validation ---
    let clusters = cluster_rows(&dense, config.proximity_distance);
    let (dividers, rejections) =
        validate_clusters(mask, &clusters, margins.content_width(), config);

    // --- 4. Split Plan ---
    let plan = SplitPlan::new(height, dividers.iter().map(|d| d.start_row));
    debug!(
        "{} dense rows, {} clusters, {} dividers, {} segments",
        dense.len(),
        clusters.len(),
        dividers.len(),
        plan.len()
    );

    DividerAnalysis {
        margins,
        dense_rows: dense,
        dividers,
        rejections,
        plan,
    }
}

/// Margins and a whole-page plan, for pages the policy declares undivided.
pub fn whole_page(mask: &GrayImage) -> DividerAnalysis {
    DividerAnalysis {
        margins: projection::margins(&projection::column_profile(mask)),
        dense_rows: Vec::new(),
        dividers: Vec::new(),
        rejections: Vec::new(),
        plan: SplitPlan::whole(mask.height()),
    }
}
