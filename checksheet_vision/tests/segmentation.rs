mod common;

use checksheet_vision::core_modules::divider::DividerRejection;
use checksheet_vision::pipeline::SegmentSkip;
use checksheet_vision::{RoutingMeta, SegmentationRequest, SheetPipeline, SourcePage};
use common::synthetic_sheet::{SheetBuilder, file_names, ruled_page};
use image::DynamicImage;
use std::path::Path;

fn request(routing: RoutingMeta, pages: Vec<DynamicImage>, out: &Path, start: usize) -> SegmentationRequest {
    SegmentationRequest {
        pages: pages.into_iter().map(SourcePage::Image).collect(),
        routing,
        serial: "SN".to_string(),
        output_dir: out.to_path_buf(),
        start_index: start,
    }
}

fn dimensions(path: &Path) -> (u32, u32) {
    let image = image::open(path).expect("segment readable");
    (image.width(), image.height())
}

#[test]
fn site_a_splits_at_every_rule_and_trims_margins() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = SheetPipeline::default();
    let routing = RoutingMeta::new("UTA", "P10", "standard");

    let report = pipeline
        .segment(&request(routing, vec![ruled_page(400, 500, &[150, 300])], dir.path(), 0))
        .expect("segmented");

    assert_eq!(file_names(&report.written), vec!["SN_0.png", "SN_1.png", "SN_2.png"]);
    assert_eq!(dimensions(&report.written[0]), (360, 150));
    assert_eq!(dimensions(&report.written[1]), (360, 150));
    assert_eq!(dimensions(&report.written[2]), (360, 200));
    assert!(report.policy_skips.is_empty());
}

#[test]
fn noise_thin_lines_and_solid_blocks_do_not_split() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = SheetPipeline::default();
    let page = SheetBuilder::new(400, 600)
        .rule(100, 3)
        .rule(200, 25)
        .partial_rule(350, 30, 20, 220)
        .rule(480, 60)
        .build();

    let report = pipeline
        .segment(&request(RoutingMeta::new("UTA", "P10", "standard"), vec![page], dir.path(), 0))
        .expect("segmented");

    assert_eq!(report.written.len(), 2);
    assert_eq!(dimensions(&report.written[0]), (360, 200));
    let rejections: Vec<&DividerRejection> = report.divider_rejections.iter().map(|(_, r)| r).collect();
    assert_eq!(rejections.len(), 3);
    assert!(matches!(rejections[0], DividerRejection::Thickness { .. }));
    assert!(matches!(
        rejections[1],
        DividerRejection::SpanWidth { span_width: 199, .. }
    ));
    assert!(matches!(rejections[2], DividerRejection::Thickness { .. }));
}

#[test]
fn site_b_flagship_keeps_header_and_drops_positions() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = SheetPipeline::default();
    let routing = RoutingMeta::new("UPA", "P20", "flagship");
    let header = ruled_page(400, 300, &[100]);
    let body = ruled_page(400, 600, &[100, 200, 300, 400]);

    let report = pipeline
        .segment(&request(routing, vec![header, body], dir.path(), 5))
        .expect("segmented");

    assert_eq!(
        file_names(&report.written),
        vec!["SN_5.png", "SN_6.png", "SN_7.png", "SN_8.png"]
    );
    assert_eq!(dimensions(&report.written[0]), (360, 300));
    let skipped: Vec<usize> = report
        .policy_skips
        .iter()
        .filter(|s| s.page == 1)
        .map(|s: &SegmentSkip| s.position)
        .collect();
    assert_eq!(skipped, vec![0, 2]);
}

#[test]
fn site_c_chains_pages_and_composes_left_multi_right_single() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = SheetPipeline::default();
    let routing = RoutingMeta::new("UMA", "P30", "standard");
    let first = SheetBuilder::new(400, 500).rule(150, 25).rule(300, 25);
    let second = SheetBuilder::new(400, 400).rule(200, 25);
    let pages = vec![
        SourcePage::Path(first.save(&dir.path().join("page_1.png"))),
        SourcePage::Path(second.save(&dir.path().join("page_2.png"))),
    ];
    let req = SegmentationRequest {
        pages,
        routing,
        serial: "SN".to_string(),
        output_dir: dir.path().join("segments"),
        start_index: 0,
    };

    let written = pipeline.segment_or_empty(&req);
    assert_eq!(
        file_names(&written),
        vec!["SN_0.png", "SN_1.png", "SN_2.png", "SN_3.png", "SN_4.png"]
    );

    let output = dir.path().join("SN.jpg");
    let composite = pipeline.compose("UMA", &written, &output).expect("composite");
    // left: 150 + 150 + 200 + 200 rows; right: 360x200 scaled to 700 rows
    assert_eq!((composite.width, composite.height), (360 + 1260, 700));
    assert_eq!(dimensions(&output), (1620, 700));
}

#[test]
fn site_a_composite_is_a_vertical_stack() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = SheetPipeline::default();
    let routing = RoutingMeta::new("UTA", "P10", "standard");
    let written = pipeline.segment_or_empty(&request(
        routing,
        vec![ruled_page(400, 600, &[200, 400])],
        dir.path(),
        0,
    ));
    assert_eq!(written.len(), 3);

    let output = dir.path().join("merged.png");
    let composite = pipeline.compose("UTA", &written, &output).expect("composite");
    assert_eq!((composite.width, composite.height), (360, 3 * 200));
}

#[test]
fn blank_page_is_one_segment() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = SheetPipeline::default();
    let blank = SheetBuilder::new(120, 80).build();

    let report = pipeline
        .segment(&request(RoutingMeta::new("XYZ", "P1", "m"), vec![blank], dir.path(), 2))
        .expect("segmented");

    assert_eq!(file_names(&report.written), vec!["SN_2.png"]);
    assert_eq!(dimensions(&report.written[0]), (120, 80));
}

#[test]
fn unreadable_later_page_leaves_nothing_on_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let out = dir.path().join("segments");
    let pipeline = SheetPipeline::default();
    let first = SheetBuilder::new(400, 500).rule(150, 25).rule(300, 25);
    let req = SegmentationRequest {
        pages: vec![
            SourcePage::Path(first.save(&dir.path().join("page_1.png"))),
            SourcePage::Path(dir.path().join("page_2_missing.png")),
        ],
        routing: RoutingMeta::new("UMA", "P30", "standard"),
        serial: "SN".to_string(),
        output_dir: out.clone(),
        start_index: 0,
    };

    assert!(pipeline.segment_or_empty(&req).is_empty());
    let on_disk = std::fs::read_dir(&out).map(|entries| entries.count()).unwrap_or(0);
    assert_eq!(on_disk, 0);
}

#[test]
fn degenerate_page_keeps_its_index_and_later_pages_are_written() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pipeline = SheetPipeline::default();
    let sliver = SheetBuilder::new(1, 80).build();
    let body = ruled_page(400, 400, &[200]);

    let report = pipeline
        .segment(&request(
            RoutingMeta::new("UMA", "P30", "standard"),
            vec![sliver, body],
            dir.path(),
            0,
        ))
        .expect("segmented");

    assert_eq!(report.degenerate_segments.len(), 1);
    let degenerate = &report.degenerate_segments[0];
    assert_eq!((degenerate.page, degenerate.position, degenerate.index), (0, 0, 0));
    assert_eq!(file_names(&report.written), vec!["SN_1.png", "SN_2.png"]);
}
