use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    camera: &'static str,
}

pub async fn healthcheck(State(state): State<SharedState>) -> Json<Health> {
    let camera = if state.pipeline.camera_in_use() {
        "streaming"
    } else {
        "idle"
    };

    Json(Health {
        status: "Available",
        camera,
    })
}
