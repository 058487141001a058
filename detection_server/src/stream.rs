use crate::camera::{CameraError, CameraLease};
use bytes::Bytes;
use futures::{stream, Stream};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::timeout;
use yolo_detector::{Annotator, DetectionError};

pub const FRAME_BOUNDARY: &str = "frame";

#[derive(Error, Debug)]
pub enum VideoStreamError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),
    #[error("Frame detection timed out after {0:?}")]
    Timeout(Duration),
    #[error("Frame worker failed: {0}")]
    Worker(String),
}

/// Live annotated frames from a leased camera.
///
/// The stream is pulled: each poll captures and annotates exactly one frame,
/// so a slow consumer stalls capture instead of queueing frames. The lease
/// (and with it the camera) is released when the stream is dropped.
pub struct VideoStream {
    lease: CameraLease,
    annotator: Arc<dyn Annotator>,
    min_confidence: f32,
    frame_timeout: Duration,
}

impl VideoStream {
    pub fn new(
        lease: CameraLease,
        annotator: Arc<dyn Annotator>,
        min_confidence: f32,
        frame_timeout: Duration,
    ) -> Self {
        Self {
            lease,
            annotator,
            min_confidence,
            frame_timeout,
        }
    }

    fn next_annotated_frame(&mut self) -> Result<Option<Vec<u8>>, VideoStreamError> {
        match self.lease.read_frame()? {
            Some(frame) => Ok(Some(
                self.annotator.annotate_frame(frame, self.min_confidence)?,
            )),
            None => Ok(None),
        }
    }

    pub fn generate_stream(self) -> impl Stream<Item = Result<Bytes, VideoStreamError>> + Send {
        stream::unfold(Some(self), |state| async move {
            let mut video_stream = state?;
            let frame_timeout = video_stream.frame_timeout;

            let worker = tokio::task::spawn_blocking(move || {
                let frame = video_stream.next_annotated_frame();
                (video_stream, frame)
            });

            match timeout(frame_timeout, worker).await {
                Ok(Ok((video_stream, Ok(Some(frame))))) => {
                    Some((Ok(multipart_chunk(&frame)), Some(video_stream)))
                }
                Ok(Ok((_, Ok(None)))) => {
                    tracing::info!("Camera stopped producing frames, ending stream");
                    None
                }
                Ok(Ok((_, Err(e)))) => {
                    tracing::error!("Error getting frame: {:?}", e);
                    Some((Err(e), None))
                }
                Ok(Err(e)) => {
                    tracing::error!("Frame worker failed: {:?}", e);
                    Some((Err(VideoStreamError::Worker(e.to_string())), None))
                }
                Err(_) => {
                    tracing::error!("Frame detection exceeded {:?}", frame_timeout);
                    Some((Err(VideoStreamError::Timeout(frame_timeout)), None))
                }
            }
        })
    }
}

pub fn multipart_chunk(frame: &[u8]) -> Bytes {
    let part_header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        FRAME_BOUNDARY,
        frame.len()
    );
    let mut body = part_header.into_bytes();
    body.extend_from_slice(frame);
    body.extend_from_slice(b"\r\n");
    Bytes::from(body)
}
