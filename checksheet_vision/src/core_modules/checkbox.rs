// THEORY:
// The `CheckboxDetector` locates blank checkbox glyphs on one segment image, so an
// operator's pen marks can later be captured per box. It only proposes candidate
// rectangles; deciding checked/unchecked happens elsewhere.
//
// Key architectural principles & algorithm steps:
// 1.  **Edges**: grayscale, a light 3x3-equivalent Gaussian blur, then Canny.
// 2.  **Shapes**: every outer edge contour is simplified to a closed polygon. Only
//     quadrilaterals go on. Hole borders trace the same edge from the inside and
//     are skipped, so one printed box yields one candidate.
// 3.  **Geometry**: the quadrilateral's bounding rectangle must be near square
//     (aspect in `[min_aspect, max_aspect]`) and small (`[min_side, max_side]`).
// 4.  **Exclusion Zones**: a candidate whose origin lies in an active zone is
//     dropped before any pixel statistics are computed.
// 5.  **Uniformity**: the contour interior is filled as a mask, eroded by
//     `interior_inset` so only the inside of the printed border remains, and the
//     std-dev of gray intensity under it is measured. A blank box is flat; printed
//     text or hatching is not.
// 6.  **Overlay**: surviving rectangles are outlined in red on a copy of the input.
//
// Every dropped candidate is reported with the rule that dropped it.

use crate::config::CheckboxConfig;
use crate::core_modules::box_merge::{self, BoxRect};
use crate::core_modules::exclusion::ZoneRect;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::drawing::{draw_hollow_rect_mut, draw_polygon_mut};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::erode;
use imageproc::point::Point;
use imageproc::rect::Rect;
use log::debug;
use serde::Serialize;

const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// A rectangle that passed every filter, with its interior flatness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckboxCandidate {
    #[serde(flatten)]
    pub rect: BoxRect,
    /// Std-dev of gray intensity inside the contour.
    pub uniformity: f64,
}

/// A quadrilateral that was dropped, and the rule that dropped it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CandidateRejection {
    AspectRatio { rect: BoxRect, aspect: f64 },
    Size { rect: BoxRect },
    ExclusionZone { rect: BoxRect, zone: ZoneRect },
    Uniformity { rect: BoxRect, std_dev: f64 },
}

/// Output of one detection pass.
#[derive(Debug, Clone)]
pub struct Detection {
    pub candidates: Vec<CheckboxCandidate>,
    pub rejections: Vec<CandidateRejection>,
    /// Contours that did not simplify to four vertices.
    pub non_quadrilateral: usize,
    pub overlay: RgbImage,
}

impl Detection {
    /// Greedy merge of the candidates, see `box_merge`.
    pub fn merged(&self, threshold: i64) -> Vec<BoxRect> {
        box_merge::merge_boxes(self.candidates.iter().map(|c| c.rect), threshold)
    }
}

pub struct CheckboxDetector<'a> {
    config: &'a CheckboxConfig,
}

impl<'a> CheckboxDetector<'a> {
    pub fn new(config: &'a CheckboxConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, image: &DynamicImage, zones: &[ZoneRect]) -> Detection {
        let gray = image.to_luma8();

        // --- 1. Edges ---
        let blurred = if self.config.blur_sigma > 0.0 {
            gaussian_blur_f32(&gray, self.config.blur_sigma)
        } else {
            gray.clone()
        };
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);

        let mut candidates = Vec::new();
        let mut rejections = Vec::new();
        let mut non_quadrilateral = 0;

        for contour in find_contours::<i32>(&edges) {
            if !matches!(contour.border_type, BorderType::Outer) {
                continue;
            }
            let points = open_contour(&contour.points);
            if points.len() < 4 {
                non_quadrilateral += 1;
                continue;
            }

            // --- 2. Shapes ---
            let epsilon = self.config.approx_epsilon_ratio * arc_length(&points, true);
            let polygon = approximate_closed_polygon(&points, epsilon);
            if polygon.len() != 4 {
                non_quadrilateral += 1;
                continue;
            }

            // --- 3. Geometry ---
            let rect = bounding_rect(&polygon);
            if let Some(rejection) = self.check_geometry(rect) {
                rejections.push(rejection);
                continue;
            }

            // --- 4. Exclusion Zones ---
            if let Some(zone) = zones.iter().find(|z| z.contains(rect.x, rect.y)) {
                debug!("checkbox candidate {rect:?} dropped: inside exclusion zone {zone:?}");
                rejections.push(CandidateRejection::ExclusionZone { rect, zone: *zone });
                continue;
            }

            // --- 5. Uniformity ---
            let std_dev = interior_std_dev(&gray, &points, self.config.interior_inset);
            if std_dev >= self.config.max_uniformity_std {
                debug!("checkbox candidate {rect:?} dropped: interior std-dev {std_dev:.1}");
                rejections.push(CandidateRejection::Uniformity { rect, std_dev });
                continue;
            }

            candidates.push(CheckboxCandidate {
                rect,
                uniformity: std_dev,
            });
        }

        // --- 6. Overlay ---
        let mut overlay = image.to_rgb8();
        for candidate in &candidates {
            let r = candidate.rect;
            draw_hollow_rect_mut(
                &mut overlay,
                Rect::at(r.x as i32, r.y as i32).of_size(r.width.max(1), r.height.max(1)),
                OVERLAY_COLOR,
            );
        }

        debug!(
            "checkbox detection: {} candidates, {} rejected, {} non-quadrilateral contours",
            candidates.len(),
            rejections.len(),
            non_quadrilateral
        );

        Detection {
            candidates,
            rejections,
            non_quadrilateral,
            overlay,
        }
    }

    fn check_geometry(&self, rect: BoxRect) -> Option<CandidateRejection> {
        let aspect = rect.width as f64 / rect.height as f64;
        if aspect < self.config.min_aspect || aspect > self.config.max_aspect {
            debug!("checkbox candidate {rect:?} dropped: aspect {aspect:.2}");
            return Some(CandidateRejection::AspectRatio { rect, aspect });
        }
        let side_ok = |side: u32| (self.config.min_side..=self.config.max_side).contains(&side);
        if !side_ok(rect.width) || !side_ok(rect.height) {
            debug!("checkbox candidate {rect:?} dropped: size");
            return Some(CandidateRejection::Size { rect });
        }
        None
    }
}

/// Contour points without a repeated closing point.
fn open_contour(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut open: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &p in points {
        if open.last() != Some(&p) {
            open.push(p);
        }
    }
    while open.len() > 1 && open.first() == open.last() {
        open.pop();
    }
    open
}

fn distance_to_line(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        let (ex, ey) = ((p.x - a.x) as f64, (p.y - a.y) as f64);
        return (ex * ex + ey * ey).sqrt();
    }
    (dy * (p.x - a.x) as f64 - dx * (p.y - a.y) as f64).abs() / length
}

/// Douglas-Peucker over the open contour, then closes it: the flattest vertex is
/// dropped while it lies within `epsilon` of the line through its cyclic neighbours.
fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let mut polygon = open_contour(&approximate_polygon_dp(points, epsilon, false));
    while polygon.len() > 3 {
        let n = polygon.len();
        let flattest = (0..n)
            .map(|i| {
                let prev = polygon[(i + n - 1) % n];
                let next = polygon[(i + 1) % n];
                (i, distance_to_line(polygon[i], prev, next))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match flattest {
            Some((i, distance)) if distance <= epsilon => {
                polygon.remove(i);
            }
            _ => break,
        }
    }
    polygon
}

/// Inclusive pixel bounds, so a box drawn from x=10 to x=27 is 18 wide.
fn bounding_rect(points: &[Point<i32>]) -> BoxRect {
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0).max(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0).max(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0).max(0);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0).max(0);
    BoxRect::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    )
}

/// Population std-dev of gray intensity over the filled contour, eroded by
/// `inset`. Small boxes fall back to the largest inset that leaves any pixels.
fn interior_std_dev(gray: &GrayImage, contour: &[Point<i32>], inset: u8) -> f64 {
    let bounds = bounding_rect(contour);
    // Padding keeps the image border from shielding mask pixels from erosion.
    let pad = inset as i32 + 1;
    let mut mask = GrayImage::new(bounds.width + 2 * pad as u32, bounds.height + 2 * pad as u32);
    let local: Vec<Point<i32>> = contour
        .iter()
        .map(|p| Point::new(p.x - bounds.x as i32 + pad, p.y - bounds.y as i32 + pad))
        .collect();
    if local.len() >= 3 {
        draw_polygon_mut(&mut mask, &local, Luma([255u8]));
    }
    for p in &local {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask.width() && (p.y as u32) < mask.height() {
            mask.put_pixel(p.x as u32, p.y as u32, Luma([255u8]));
        }
    }

    let eroded = (1..=inset)
        .rev()
        .map(|k| erode(&mask, Norm::LInf, k))
        .find(|eroded| eroded.pixels().any(|p| p.0[0] > 0));
    let interior = eroded.unwrap_or(mask);

    let mut count = 0u64;
    let mut sum = 0f64;
    let mut sum_sq = 0f64;
    for (x, y, m) in interior.enumerate_pixels() {
        if m.0[0] == 0 {
            continue;
        }
        let gx = bounds.x as i64 + x as i64 - pad as i64;
        let gy = bounds.y as i64 + y as i64 - pad as i64;
        if gx < 0 || gy < 0 || gx >= gray.width() as i64 || gy >= gray.height() as i64 {
            continue;
        }
        let v = gray.get_pixel(gx as u32, gy as u32).0[0] as f64;
        count += 1;
        sum += v;
        sum_sq += v * v;
    }
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0).sqrt()
}
