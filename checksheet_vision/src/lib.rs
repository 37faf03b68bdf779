// THEORY:
// This file is the main entry point for the `checksheet_vision` library crate.
// It defines the public API exposed to the services that ingest inspection sheets.
//
// The primary goal is to export the `SheetPipeline` and its report types as the
// high-level interface: segment a document, detect checkboxes on a segment, and
// compose a finished serial. The leaf algorithms (`core_modules`) stay public for
// callers that need a single stage, but the pipeline is the intended way in.

pub mod batch;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use batch::BatchSegmenter;
pub use config::EngineConfig;
pub use error::{Result, SheetError};
pub use pipeline::{
    DetectionReport, RoutingMeta, SegmentationReport, SegmentationRequest, SheetPipeline, SourcePage,
};
