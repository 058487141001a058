mod annotator;
mod cv_utils;
mod error;
mod labels;
mod model_service;
mod ort_service;

pub mod config;

pub use annotator::{Annotator, YoloAnnotator};
pub use cv_utils::{CvImage, CvUtilsError};
pub use error::DetectionError;
pub use labels::{load_labels, BoundingBoxWithLabels, ColorLabel};
pub use model_service::{BoundingBox, ModelService};
pub use ort_service::OrtModelService;
