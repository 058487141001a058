use crate::{error::PipelineError, server::SharedState, stream::FRAME_BOUNDARY};
use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use tracing::instrument;

const ROUTE: &str = "/camera-detection";

#[instrument(skip(state))]
pub async fn camera_detection(State(state): State<SharedState>) -> Result<Response, PipelineError> {
    state.metrics.record_request(ROUTE);

    // Acquire before the response starts so a busy camera is a plain error.
    let video_stream = state.pipeline.stream_camera().await?;

    let metrics = state.metrics.clone();
    let frames = video_stream
        .generate_stream()
        .inspect_ok(move |_| metrics.record_streamed_frame());

    let content_type = format!("multipart/x-mixed-replace; boundary={}", FRAME_BOUNDARY);
    Ok(([(header::CONTENT_TYPE, content_type)], Body::from_stream(frames)).into_response())
}
