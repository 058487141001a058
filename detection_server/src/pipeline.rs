use crate::{
    camera::CameraGate,
    config::DetectionConfig,
    error::PipelineError,
    scratch::{ScratchDir, ScratchSpace},
    store::{BlobStore, StoredImage},
    stream::VideoStream,
};
use bytes::Bytes;
use std::{fs, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::instrument;
use yolo_detector::Annotator;

const PROCESSED_PREFIX: &str = "processed_";

/// An uploaded image file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessedImage {
    pub original_id: i64,
    pub processed_id: i64,
}

impl ProcessedImage {
    pub fn url(&self) -> String {
        format!("/processed/{}", self.processed_id)
    }
}

/// One image's trip through the annotator. Owns its scratch directory, which
/// is removed when the job is dropped, whichever way `run` exits.
struct DetectionJob {
    scratch: ScratchDir,
    source_name: String,
    min_confidence: f32,
}

impl DetectionJob {
    fn new(space: &ScratchSpace, source_name: &str, min_confidence: f32) -> std::io::Result<Self> {
        Ok(Self {
            scratch: space.allocate()?,
            source_name: source_name.to_string(),
            min_confidence,
        })
    }

    fn run(self, source: &[u8], annotator: &dyn Annotator) -> Result<Vec<u8>, PipelineError> {
        let job_id = self.scratch.job_id();
        tracing::debug!(%job_id, "Running detection job");

        let input = self.scratch.write_input(&self.source_name, source)?;
        let output = self.scratch.output_path();
        annotator.annotate_file(&input, &output, self.min_confidence)?;
        let annotated = fs::read(&output)?;

        if let Err(e) = self.scratch.close() {
            tracing::warn!(%job_id, "Failed to remove scratch directory: {}", e);
        }
        Ok(annotated)
    }
}

/// Application context for the request flows: built once at startup and
/// shared by every handler.
pub struct DetectionPipeline {
    store: Arc<dyn BlobStore>,
    annotator: Arc<dyn Annotator>,
    scratch: ScratchSpace,
    camera: CameraGate,
    min_confidence: f32,
    detection_timeout: Duration,
}

impl DetectionPipeline {
    pub fn new(
        store: Arc<dyn BlobStore>,
        annotator: Arc<dyn Annotator>,
        scratch: ScratchSpace,
        camera: CameraGate,
        detection_config: &DetectionConfig,
    ) -> Self {
        Self {
            store,
            annotator,
            scratch,
            camera,
            min_confidence: detection_config.min_confidence,
            detection_timeout: detection_config.get_timeout(),
        }
    }

    /// Stores the upload, annotates it and stores the result.
    ///
    /// The original is committed before detection runs and is kept if a
    /// later step fails.
    #[instrument(skip(self, upload), fields(filename = %upload.filename, bytes = upload.data.len()))]
    pub async fn process_image(&self, upload: Upload) -> Result<ProcessedImage, PipelineError> {
        if upload.filename.is_empty() {
            return Err(PipelineError::Validation("No selected file".to_string()));
        }

        let original_id = self.store.put(&upload.filename, upload.data.clone()).await?;

        let annotated = match self.detect(&upload).await {
            Ok(annotated) => annotated,
            Err(e) => {
                tracing::warn!(original_id, "Detection failed, original image left in store");
                return Err(e);
            }
        };

        let processed_name = format!("{}{}", PROCESSED_PREFIX, upload.filename);
        let processed_id = self
            .store
            .put(&processed_name, Bytes::from(annotated))
            .await?;

        tracing::info!(original_id, processed_id, "Image processed");
        Ok(ProcessedImage {
            original_id,
            processed_id,
        })
    }

    async fn detect(&self, upload: &Upload) -> Result<Vec<u8>, PipelineError> {
        let scratch = self.scratch.clone();
        let annotator = self.annotator.clone();
        let filename = upload.filename.clone();
        let data = upload.data.clone();
        let min_confidence = self.min_confidence;

        let worker = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, PipelineError> {
            DetectionJob::new(&scratch, &filename, min_confidence)?.run(&data, annotator.as_ref())
        });

        match timeout(self.detection_timeout, worker).await {
            Ok(result) => result?,
            Err(_) => Err(PipelineError::DetectionTimeout(self.detection_timeout)),
        }
    }

    pub async fn get_processed(&self, id: i64) -> Result<StoredImage, PipelineError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    pub fn camera_in_use(&self) -> bool {
        self.camera.in_use()
    }

    /// Takes the camera and returns a lazy stream of annotated frames.
    /// Fails immediately if the camera is busy or cannot be opened.
    pub async fn stream_camera(&self) -> Result<VideoStream, PipelineError> {
        let lease = self.camera.acquire().await?;
        Ok(VideoStream::new(
            lease,
            self.annotator.clone(),
            self.min_confidence,
            self.detection_timeout,
        ))
    }
}
