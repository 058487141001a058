use crate::{
    cv_utils::CvImage,
    error::DetectionError,
    labels::{attach_labels, ColorLabel},
    model_service::ModelService,
};
use image::DynamicImage;
use std::{fs, path::Path};
use tracing::instrument;

/// Detect objects in an encoded image and draw them onto it.
pub trait Annotator: Send + Sync + 'static {
    /// Returns the annotated image as JPEG bytes.
    fn annotate(&self, image_data: &[u8], min_confidence: f32)
        -> Result<Vec<u8>, DetectionError>;

    /// Annotates an already decoded frame, such as one read from a camera.
    fn annotate_frame(
        &self,
        frame: CvImage,
        min_confidence: f32,
    ) -> Result<Vec<u8>, DetectionError> {
        self.annotate(&frame.to_jpg()?, min_confidence)
    }

    /// File-addressed variant: reads `source` and writes the annotated JPEG to `target`.
    fn annotate_file(
        &self,
        source: &Path,
        target: &Path,
        min_confidence: f32,
    ) -> Result<(), DetectionError> {
        let image_data = fs::read(source)?;
        let annotated = self.annotate(&image_data, min_confidence)?;
        fs::write(target, annotated)?;
        Ok(())
    }
}

pub struct YoloAnnotator<M: ModelService> {
    model_service: M,
    class_labels: Vec<ColorLabel>,
}

impl<M: ModelService> YoloAnnotator<M> {
    pub fn new(model_service: M, class_labels: Vec<ColorLabel>) -> Self {
        Self {
            model_service,
            class_labels,
        }
    }
}

impl<M: ModelService> Annotator for YoloAnnotator<M> {
    #[instrument(skip(self, image_data), fields(bytes = image_data.len()))]
    fn annotate(
        &self,
        image_data: &[u8],
        min_confidence: f32,
    ) -> Result<Vec<u8>, DetectionError> {
        self.annotate_frame(CvImage::from_bytes(image_data)?, min_confidence)
    }

    fn annotate_frame(
        &self,
        mut frame: CvImage,
        min_confidence: f32,
    ) -> Result<Vec<u8>, DetectionError> {
        if frame.is_empty() {
            return Err(DetectionError::EmptyImage);
        }

        let pixels = DynamicImage::ImageRgb8(frame.to_rgb_image()?);
        let detections = self.model_service.predict(&pixels, min_confidence)?;
        let labelled = attach_labels(detections, &self.class_labels);
        tracing::debug!("Drawing {} detections", labelled.len());

        Ok(frame.annotate(&labelled)?.to_jpg()?)
    }
}
