mod camera_detection;
mod health;
mod metrics;
mod process_image;
mod processed;

use crate::server::SharedState;
use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};

pub fn api_routes(max_upload_bytes: usize) -> Router<SharedState> {
    Router::new()
        .route("/camera-detection", get(camera_detection::camera_detection))
        .route(
            "/process-image",
            post(process_image::process_image).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/processed/{id}", get(processed::get_processed))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}
