use crate::labels::BoundingBoxWithLabels;
use image::RgbImage;
use opencv::{
    core::{Mat, Point, Rect, Scalar, Vector},
    imgcodecs, imgproc,
    prelude::*,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CvUtilsError {
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(opencv::Error),
    #[error("OpenCV error: {0}")]
    OpenCvError(opencv::Error),
    #[error("OpenCV decode error: {0}")]
    OpenCvDecodeError(opencv::Error),
    #[error("Unexpected pixel layout: {0}")]
    UnexpectedLayout(String),
}

impl From<opencv::Error> for CvUtilsError {
    fn from(err: opencv::Error) -> Self {
        CvUtilsError::OpenCvError(err)
    }
}

pub struct CvImage {
    pub mat: Mat,
}

impl CvImage {
    pub fn from_mat(mat: Mat) -> Self {
        Self { mat }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CvUtilsError> {
        let mat = imgcodecs::imdecode(&Vector::from_slice(bytes), imgcodecs::IMREAD_COLOR)
            .map_err(CvUtilsError::OpenCvDecodeError)?;
        Ok(Self { mat })
    }

    /// `imdecode` yields an empty matrix rather than an error on unreadable data.
    pub fn is_empty(&self) -> bool {
        self.mat.empty()
    }

    pub fn to_jpg(&self) -> Result<Vec<u8>, CvUtilsError> {
        let mut buf = Vector::<u8>::new();
        imgcodecs::imencode(".jpg", &self.mat, &mut buf, &Vector::new())
            .map_err(CvUtilsError::EncodeFrameFailed)?;
        Ok(buf.into())
    }

    /// Copies the BGR matrix into an RGB buffer for the model input.
    pub fn to_rgb_image(&self) -> Result<RgbImage, CvUtilsError> {
        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&self.mat, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let pixels = rgb.data_bytes()?.to_vec();
        RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            CvUtilsError::UnexpectedLayout(format!("{}x{} matrix is not 8-bit RGB", width, height))
        })
    }

    pub fn annotate(
        &mut self,
        bboxes: &[BoundingBoxWithLabels],
    ) -> Result<&mut Self, CvUtilsError> {
        for bbox in bboxes {
            let x1 = bbox.x1 as i32;
            let y1 = bbox.y1 as i32;
            let x2 = bbox.x2 as i32;
            let y2 = bbox.y2 as i32;
            let label = format!("{}: {:.2}", bbox.class_label, bbox.confidence);

            let color = Scalar::new(bbox.blue as f64, bbox.green as f64, bbox.red as f64, 0.0);

            imgproc::rectangle(
                &mut self.mat,
                Rect::new(x1, y1, x2 - x1, y2 - y1),
                color,
                2,
                imgproc::LINE_8,
                0,
            )?;

            imgproc::put_text(
                &mut self.mat,
                &label,
                Point::new(x1, (y1 - 5).max(10)),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.5,
                color,
                1,
                imgproc::LINE_AA,
                false,
            )?;
        }
        Ok(self)
    }
}
