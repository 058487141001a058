mod routes;
mod stream;
mod telemetry;

pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scratch;
pub mod server;
pub mod store;

pub use app::start_app;
pub use stream::{multipart_chunk, VideoStream, VideoStreamError, FRAME_BOUNDARY};
pub use telemetry::Metrics;
