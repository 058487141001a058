use crate::{error::PipelineError, server::SharedState};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::instrument;

const ROUTE: &str = "/processed";

/// Serves any stored image by id. Ids that are not integers are treated as
/// unknown.
#[instrument(skip(state))]
pub async fn get_processed(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, PipelineError> {
    state.metrics.record_request(ROUTE);

    let id: i64 = id.parse().map_err(|_| PipelineError::NotFound(id.clone()))?;
    let image = state.pipeline.get_processed(id).await?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], image.data).into_response())
}
