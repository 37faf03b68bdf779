// THEORY:
// The `pipeline` module is the top-level API of the engine. It wires the leaf
// algorithms in `core_modules` into the three operations a caller actually needs:
//
// 1.  **Segment**: a document (one serial, one or more rendered pages) goes through
//     Binarizer -> Projection -> Divider engine -> Segmentation policy, and the kept
//     segments are written as `{serial}_{index}.png`.
// 2.  **Detect**: one segment image goes through the checkbox detector, with the
//     exclusion zones of its routing context, and comes back as candidates, merged
//     boxes and a PNG overlay for review.
// 3.  **Compose**: the saved segments of a finished serial are reassembled with the
//     layout of the serial's site.
//
// `SheetPipeline` holds only configuration. It has no mutable state, so one
// instance can be shared across threads by the batch driver.

use crate::config::EngineConfig;
use crate::core_modules::binarizer::binarizer;
use crate::core_modules::checkbox::CheckboxDetector;
use crate::core_modules::composite;
use crate::core_modules::divider::{self, DividerAnalysis};
use crate::core_modules::image_helper::image_helper;
use crate::core_modules::site_policy::{PageLayout, SegmentDecision, SegmentationPolicy, next_cursor};
use crate::error::{Result, SheetError};
use image::DynamicImage;
use image::imageops;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

// Re-export key data structures for the public API.
pub use crate::core_modules::box_merge::BoxRect;
pub use crate::core_modules::checkbox::{CandidateRejection, CheckboxCandidate};
pub use crate::core_modules::composite::{CompositeLayout, CompositeReport, SkippedInput};
pub use crate::core_modules::divider::DividerRejection;
pub use crate::core_modules::site_policy::{RoutingMeta, SkipReason};

/// One page of a document: already decoded, or a path to decode.
#[derive(Debug, Clone)]
pub enum SourcePage {
    Path(PathBuf),
    Image(DynamicImage),
}

impl SourcePage {
    fn decode(&self) -> Result<DynamicImage> {
        match self {
            SourcePage::Path(path) => image_helper::load(path),
            SourcePage::Image(image) => Ok(image.clone()),
        }
    }
}

impl From<PathBuf> for SourcePage {
    fn from(path: PathBuf) -> Self {
        SourcePage::Path(path)
    }
}

impl From<DynamicImage> for SourcePage {
    fn from(image: DynamicImage) -> Self {
        SourcePage::Image(image)
    }
}

/// Everything needed to segment one serial's document.
#[derive(Debug, Clone)]
pub struct SegmentationRequest {
    /// Rendered pages, in document order.
    pub pages: Vec<SourcePage>,
    pub routing: RoutingMeta,
    pub serial: String,
    pub output_dir: PathBuf,
    /// Output index of the first kept segment.
    pub start_index: usize,
}

/// A segment the site's skip rules dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSkip {
    pub page: usize,
    pub position: usize,
    pub reason: SkipReason,
}

/// A kept segment whose crop came out empty. Its index stays reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegenerateSegment {
    pub page: usize,
    pub position: usize,
    pub index: usize,
    pub rows: (u32, u32),
    pub columns: (u32, u32),
}

/// Outcome of one segmentation request.
#[derive(Debug, Clone, Default)]
pub struct SegmentationReport {
    /// Written segment files, in output order.
    pub written: Vec<PathBuf>,
    /// Divider candidates that failed validation, with their page index.
    pub divider_rejections: Vec<(usize, DividerRejection)>,
    pub policy_skips: Vec<SegmentSkip>,
    pub degenerate_segments: Vec<DegenerateSegment>,
}

/// Outcome of one checkbox detection.
#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub boxes: Vec<CheckboxCandidate>,
    /// `boxes` after the greedy merge at the configured threshold.
    pub merged: Vec<BoxRect>,
    pub rejections: Vec<CandidateRejection>,
    pub non_quadrilateral: usize,
    /// The source with every surviving candidate outlined in red, PNG-encoded.
    pub overlay_png: Vec<u8>,
}

/// The main, top-level struct for the engine.
#[derive(Debug, Clone, Default)]
pub struct SheetPipeline {
    config: EngineConfig,
    policy: SegmentationPolicy,
}

impl SheetPipeline {
    pub fn new(config: EngineConfig) -> Self {
        let policy = SegmentationPolicy::new(config.sites.clone());
        Self { config, policy }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn policy(&self) -> &SegmentationPolicy {
        &self.policy
    }

    /// Divider analysis of one page under the given layout.
    pub fn analyze_page(&self, image: &DynamicImage, layout: PageLayout) -> DividerAnalysis {
        let mask = binarizer::binarize_image(image, self.config.binarize.threshold);
        match layout {
            PageLayout::Split => divider::analyze(&mask, &self.config.divider),
            PageLayout::Whole => divider::whole_page(&mask),
        }
    }

    /// Segments one document and writes the kept segments. Every page is decoded
    /// before the first file is written, so an unreadable page leaves no output.
    pub fn segment(&self, request: &SegmentationRequest) -> Result<SegmentationReport> {
        let routing = &request.routing;
        let mut report = SegmentationReport::default();
        let mut cursor = request.start_index;

        let images = request
            .pages
            .iter()
            .map(SourcePage::decode)
            .collect::<Result<Vec<_>>>()?;

        for (page_index, image) in images.iter().enumerate() {
            let rgb = image.to_rgb8();

            // --- 1. Dividers ---
            let layout = self.policy.page_layout(routing, page_index);
            let analysis = self.analyze_page(image, layout);
            report
                .divider_rejections
                .extend(analysis.rejections.iter().map(|r| (page_index, *r)));

            // --- 2. Policy ---
            let segments = analysis.plan.segments();
            let decisions = self
                .policy
                .decide_page(routing, page_index, segments.len(), cursor);
            cursor = next_cursor(cursor, &decisions);

            // --- 3. Crop & Write ---
            let margins = analysis.margins;
            for (decision, &(start_row, end_row)) in decisions.iter().zip(&segments) {
                let position = decision.position();
                let index = match *decision {
                    SegmentDecision::Skip { rule, .. } => {
                        report.policy_skips.push(SegmentSkip {
                            page: page_index,
                            position,
                            reason: rule,
                        });
                        continue;
                    }
                    SegmentDecision::Keep { output_index, .. } => output_index,
                };

                if margins.is_degenerate() || end_row <= start_row {
                    warn!(
                        "{}: page {page_index} segment {position} is degenerate (rows {start_row}..{end_row}, columns {}..={}), not written",
                        request.serial, margins.left, margins.right
                    );
                    report.degenerate_segments.push(DegenerateSegment {
                        page: page_index,
                        position,
                        index,
                        rows: (start_row, end_row),
                        columns: (margins.left, margins.right),
                    });
                    continue;
                }

                let crop = imageops::crop_imm(
                    &rgb,
                    margins.left,
                    start_row,
                    margins.right - margins.left + 1,
                    end_row - start_row,
                )
                .to_image();
                let path = request
                    .output_dir
                    .join(format!("{}_{}.png", request.serial, index));
                image_helper::save_png(&path, &crop)?;
                debug!("{}: wrote {}", request.serial, path.display());
                report.written.push(path);
            }
        }

        info!(
            "{} ({}/{}/{}): {} segments written, {} skipped, {} degenerate, {} divider candidates rejected",
            request.serial,
            routing.department,
            routing.process,
            routing.model,
            report.written.len(),
            report.policy_skips.len(),
            report.degenerate_segments.len(),
            report.divider_rejections.len()
        );
        Ok(report)
    }

    /// Happy-path wrapper: the written paths, or an empty list after logging the error.
    pub fn segment_or_empty(&self, request: &SegmentationRequest) -> Vec<PathBuf> {
        match self.segment(request) {
            Ok(report) => report.written,
            Err(err) => {
                error!("segmentation of {} failed: {err}", request.serial);
                Vec::new()
            }
        }
    }

    /// Checkbox detection on one segment, with the exclusion zones of `routing`.
    pub fn detect(&self, image: &DynamicImage, routing: Option<&RoutingMeta>) -> Result<DetectionReport> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(SheetError::DegenerateGeometry(format!(
                "cannot detect checkboxes on a {width}x{height} image"
            )));
        }
        let zones = routing
            .map(|r| self.config.exclusion_zones.zones_for(r))
            .unwrap_or_default();

        let detection = CheckboxDetector::new(&self.config.checkbox).detect(image, &zones);
        let merged = detection.merged(self.config.checkbox.merge_threshold);
        let overlay_png = image_helper::encode_png(&detection.overlay)?;
        info!(
            "checkbox detection: {} candidates merged into {} boxes, {} rejected",
            detection.candidates.len(),
            merged.len(),
            detection.rejections.len()
        );

        Ok(DetectionReport {
            boxes: detection.candidates,
            merged,
            rejections: detection.rejections,
            non_quadrilateral: detection.non_quadrilateral,
            overlay_png,
        })
    }

    pub fn detect_file(&self, path: &Path, routing: Option<&RoutingMeta>) -> Result<DetectionReport> {
        let image = image_helper::load(path)?;
        self.detect(&image, routing)
    }

    /// Composite of saved segments with the layout of `department`'s site.
    pub fn compose<P: AsRef<Path>>(
        &self,
        department: &str,
        paths: &[P],
        output: &Path,
    ) -> Result<CompositeReport> {
        let layout = self.policy.composite_layout(department);
        composite::compose(layout, paths, output, &self.config.composite)
    }
}
