use crate::cv_utils::CvUtilsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Image transformation error: {0}")]
    ImageTransformation(String),
    #[error("Image could not be decoded")]
    EmptyImage,
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Cv utils error: {0}")]
    CvUtils(#[from] CvUtilsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ort::Error> for DetectionError {
    fn from(err: ort::Error) -> Self {
        DetectionError::Inference(err.to_string())
    }
}
