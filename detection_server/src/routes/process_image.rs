use crate::{
    error::PipelineError,
    pipeline::Upload,
    server::SharedState,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Json,
};
use serde::Serialize;
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "/process-image";
const FILE_FIELD: &str = "image";

#[derive(Serialize)]
pub struct ProcessedUrl {
    url: String,
}

#[instrument(skip(state, multipart))]
pub async fn process_image(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessedUrl>, PipelineError> {
    state.metrics.record_request(ROUTE);
    let start = Instant::now();

    let upload = read_upload(multipart).await?;
    let processed = state.pipeline.process_image(upload).await?;

    state
        .metrics
        .record_detection_duration(start.elapsed().as_millis() as u64, ROUTE);

    Ok(Json(ProcessedUrl {
        url: processed.url(),
    }))
}

fn no_file_part() -> PipelineError {
    PipelineError::Validation("No file part in the request".to_string())
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, PipelineError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Request is not multipart: {}", e);
        no_file_part()
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(no_file_part()),
            Err(e) => {
                tracing::warn!("Malformed multipart body: {}", e);
                return Err(no_file_part());
            }
        };

        // Parts without a filename are form fields, not files.
        let filename = match (field.name(), field.file_name()) {
            (Some(FILE_FIELD), Some(filename)) => filename.to_string(),
            _ => continue,
        };
        if filename.is_empty() {
            return Err(PipelineError::Validation("No selected file".to_string()));
        }

        let data = field.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read uploaded file: {}", e);
            PipelineError::Validation(e.body_text())
        })?;

        return Ok(Upload { filename, data });
    }
}
