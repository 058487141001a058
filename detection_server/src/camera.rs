use opencv::{core::Mat, prelude::*, videoio};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use yolo_detector::CvImage;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    OpenCameraFailed(opencv::Error),
    #[error("Could not access the camera at index {0}")]
    DeviceUnavailable(i32),
    #[error("Camera device busy")]
    DeviceBusy,
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(opencv::Error),
    #[error("Camera worker failed: {0}")]
    Worker(String),
}

/// A live source of decoded BGR frames.
pub trait FrameSource: Send + 'static {
    /// Blocks until the next frame. `Ok(None)` means the source stopped producing frames.
    fn read_frame(&mut self) -> Result<Option<CvImage>, CameraError>;
}

/// Opens frame sources for one physical device.
pub trait CameraDevice: Send + Sync + 'static {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError>;
}

pub struct OpenCvCameraDevice {
    device_index: i32,
}

impl OpenCvCameraDevice {
    pub fn new(device_index: i32) -> Self {
        Self { device_index }
    }
}

impl CameraDevice for OpenCvCameraDevice {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        let capture = videoio::VideoCapture::new(self.device_index, videoio::CAP_ANY)
            .map_err(CameraError::OpenCameraFailed)?;
        if !capture.is_opened().map_err(CameraError::OpenCameraFailed)? {
            return Err(CameraError::DeviceUnavailable(self.device_index));
        }

        tracing::info!("Opened camera at index {}", self.device_index);
        Ok(Box::new(OpenCvCamera {
            capture,
            device_index: self.device_index,
        }))
    }
}

struct OpenCvCamera {
    capture: videoio::VideoCapture,
    device_index: i32,
}

impl FrameSource for OpenCvCamera {
    fn read_frame(&mut self) -> Result<Option<CvImage>, CameraError> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(CameraError::ReadFrameFailed)?;
        if !grabbed || frame.empty() {
            return Ok(None);
        }

        Ok(Some(CvImage::from_mat(frame)))
    }
}

impl Drop for OpenCvCamera {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("Failed to release camera {}: {}", self.device_index, e);
        } else {
            tracing::info!("Released camera at index {}", self.device_index);
        }
    }
}

/// Hands out the camera to one holder at a time.
#[derive(Clone)]
pub struct CameraGate {
    device: Arc<dyn CameraDevice>,
    permit: Arc<Semaphore>,
}

impl CameraGate {
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self {
            device,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn in_use(&self) -> bool {
        self.permit.available_permits() == 0
    }

    /// Fails with [`CameraError::DeviceBusy`] instead of waiting when the camera is held.
    ///
    /// The permit travels with the opening worker, so a caller that gives up
    /// mid-open keeps the gate closed until the orphaned device is dropped.
    pub async fn acquire(&self) -> Result<CameraLease, CameraError> {
        let permit = self
            .permit
            .clone()
            .try_acquire_owned()
            .map_err(|_| CameraError::DeviceBusy)?;

        let device = self.device.clone();
        tokio::task::spawn_blocking(move || {
            device.open().map(|source| CameraLease {
                source,
                _permit: permit,
            })
        })
        .await
        .map_err(|e| CameraError::Worker(e.to_string()))?
    }
}

/// Exclusive handle on an open camera. Dropping it closes the device, then
/// frees the gate.
pub struct CameraLease {
    source: Box<dyn FrameSource>,
    _permit: OwnedSemaphorePermit,
}

impl CameraLease {
    pub fn read_frame(&mut self) -> Result<Option<CvImage>, CameraError> {
        self.source.read_frame()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    pub(crate) const FRAME_WIDTH: i32 = 8;
    pub(crate) const FRAME_HEIGHT: i32 = 6;

    pub(crate) fn solid_frame() -> CvImage {
        let mat = Mat::new_rows_cols_with_default(
            FRAME_HEIGHT,
            FRAME_WIDTH,
            CV_8UC3,
            Scalar::new(0.0, 128.0, 255.0, 0.0),
        )
        .unwrap();
        CvImage::from_mat(mat)
    }

    /// Yields `frames` solid frames, then reports end of stream.
    pub(crate) struct MockCameraDevice {
        pub frames: usize,
        pub opened: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
    }

    impl MockCameraDevice {
        pub(crate) fn new(frames: usize) -> Self {
            Self {
                frames,
                opened: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct MockFrameSource {
        remaining: usize,
        released: Arc<AtomicUsize>,
    }

    impl FrameSource for MockFrameSource {
        fn read_frame(&mut self) -> Result<Option<CvImage>, CameraError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(solid_frame()))
        }
    }

    impl Drop for MockFrameSource {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CameraDevice for MockCameraDevice {
        fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockFrameSource {
                remaining: self.frames,
                released: self.released.clone(),
            }))
        }
    }

    /// Takes `delay` to open and counts how many opened sources are alive.
    struct SlowOpeningDevice {
        delay: Duration,
        live: Arc<AtomicUsize>,
        max_live: Arc<AtomicUsize>,
    }

    struct CountedSource {
        live: Arc<AtomicUsize>,
    }

    impl FrameSource for CountedSource {
        fn read_frame(&mut self) -> Result<Option<CvImage>, CameraError> {
            Ok(None)
        }
    }

    impl Drop for CountedSource {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl CameraDevice for SlowOpeningDevice {
        fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
            std::thread::sleep(self.delay);
            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(live, Ordering::SeqCst);
            Ok(Box::new(CountedSource {
                live: self.live.clone(),
            }))
        }
    }

    struct UnavailableDevice;

    impl CameraDevice for UnavailableDevice {
        fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
            Err(CameraError::DeviceUnavailable(1))
        }
    }

    #[tokio::test]
    async fn test_second_acquire_is_busy() {
        let gate = CameraGate::new(Arc::new(MockCameraDevice::new(3)));

        let lease = gate.acquire().await.unwrap();
        let second = gate.acquire().await;

        assert!(matches!(second, Err(CameraError::DeviceBusy)));
        drop(lease);
    }

    #[tokio::test]
    async fn test_dropping_lease_releases_device_once() {
        let device = MockCameraDevice::new(3);
        let released = device.released.clone();
        let opened = device.opened.clone();
        let gate = CameraGate::new(Arc::new(device));

        let mut lease = gate.acquire().await.unwrap();
        assert!(lease.read_frame().unwrap().is_some());
        drop(lease);
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let again = gate.acquire().await;
        assert!(again.is_ok());
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unavailable_device_fails_fast_and_frees_permit() {
        let gate = CameraGate::new(Arc::new(UnavailableDevice));

        assert!(matches!(
            gate.acquire().await,
            Err(CameraError::DeviceUnavailable(1))
        ));
        assert!(matches!(
            gate.acquire().await,
            Err(CameraError::DeviceUnavailable(1))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_acquire_keeps_gate_closed_until_open_finishes() {
        let max_live = Arc::new(AtomicUsize::new(0));
        let gate = CameraGate::new(Arc::new(SlowOpeningDevice {
            delay: Duration::from_millis(300),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: max_live.clone(),
        }));

        let cancelled = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(cancelled.is_err());

        assert!(matches!(gate.acquire().await, Err(CameraError::DeviceBusy)));

        tokio::time::sleep(Duration::from_millis(500)).await;
        let lease = gate.acquire().await.unwrap();
        assert_eq!(max_live.load(Ordering::SeqCst), 1);
        drop(lease);
    }
}
