// THEORY:
// The batch driver segments many independent documents at once. Segmentation is
// CPU-bound and synchronous, so every document runs on tokio's blocking pool, and a
// semaphore sized to the machine's core count keeps at most that many in flight.
//
// Documents share nothing but the read-only `SheetPipeline`. Two requests writing
// the same serial into the same directory are not coordinated here; the caller
// has to keep them apart.

use crate::error::{Result, SheetError};
use crate::pipeline::{SegmentationReport, SegmentationRequest, SheetPipeline, SourcePage};
use crate::core_modules::site_policy::RoutingMeta;
use futures::future::join_all;
use log::{error, info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One document of a batch manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentEntry {
    pub serial: String,
    #[serde(flatten)]
    pub routing: RoutingMeta,
    pub pages: Vec<PathBuf>,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub start_index: usize,
}

impl DocumentEntry {
    pub fn into_request(self) -> SegmentationRequest {
        SegmentationRequest {
            pages: self.pages.into_iter().map(SourcePage::Path).collect(),
            routing: self.routing,
            serial: self.serial,
            output_dir: self.output_dir,
            start_index: self.start_index,
        }
    }
}

/// Reads a JSON array of `DocumentEntry`.
pub fn load_manifest(path: &Path) -> Result<Vec<DocumentEntry>> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data)
        .map_err(|e| SheetError::Config(format!("failed to parse manifest {}: {e}", path.display())))
}

pub struct BatchSegmenter {
    pipeline: Arc<SheetPipeline>,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl BatchSegmenter {
    /// One concurrent document per logical core.
    pub fn new(pipeline: SheetPipeline) -> Self {
        Self::with_concurrency(pipeline, num_cpus::get())
    }

    pub fn with_concurrency(pipeline: SheetPipeline, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            pipeline: Arc::new(pipeline),
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Stops accepting work. Documents already holding a permit run to completion;
    /// every document still waiting, and every later batch, fails with `BatchClosed`.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Segments every request; results come back in request order.
    pub async fn segment_all(&self, requests: Vec<SegmentationRequest>) -> Vec<Result<SegmentationReport>> {
        let total = requests.len();
        info!("segmenting {total} documents, {} at a time", self.concurrency);

        let tasks = requests.into_iter().map(|request| {
            let pipeline = Arc::clone(&self.pipeline);
            let permits = Arc::clone(&self.permits);
            async move {
                let serial = request.serial.clone();
                let permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("{serial} not segmented: batch segmenter is closed");
                        return Err(SheetError::BatchClosed);
                    }
                };
                let outcome = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    pipeline.segment(&request)
                })
                .await;
                match outcome {
                    Ok(result) => result,
                    Err(join_error) => {
                        error!("segmentation worker for {serial} failed: {join_error}");
                        Err(SheetError::from(join_error))
                    }
                }
            }
        });

        let results = join_all(tasks).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        info!("batch finished: {} documents ok, {failed} failed", total - failed);
        results
    }
}
