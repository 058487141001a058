use crate::{
    camera::{CameraGate, OpenCvCameraDevice},
    config::Config,
    pipeline::DetectionPipeline,
    scratch::ScratchSpace,
    server::HttpServer,
    store::SqliteBlobStore,
};
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};
use yolo_detector::{config::Validatable, load_labels, OrtModelService, YoloAnnotator};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let model_service = match OrtModelService::new(&config.model) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to initialize model service: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let labels = load_labels(&config.labels.get_path())?;
    tracing::info!("Loaded {} class labels", labels.len());
    let annotator = Arc::new(YoloAnnotator::new(model_service, labels));

    let store = match SqliteBlobStore::open(&config.storage.database_url) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open image store: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let scratch = ScratchSpace::new(&config.scratch.dir)?;
    let camera = CameraGate::new(Arc::new(OpenCvCameraDevice::new(
        config.camera.device_index,
    )));

    let pipeline = Arc::new(DetectionPipeline::new(
        store,
        annotator,
        scratch,
        camera,
        &config.detection,
    ));

    let server = HttpServer::new(pipeline, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Server exited with error: {:?}", e),
        Err(e) => tracing::error!("Server task failed: {:?}", e),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
