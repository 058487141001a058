use crate::error::DetectionError;
use image::DynamicImage;

/// A raw detection in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub class_id: u32,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Runs the detection model on a decoded image.
///
/// Implementations are blocking; async callers are expected to move the call
/// onto a blocking thread.
pub trait ModelService: Send + Sync + 'static {
    fn predict(
        &self,
        image: &DynamicImage,
        min_confidence: f32,
    ) -> Result<Vec<BoundingBox>, DetectionError>;
}
