use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::imageops::FilterType;
use serde::Deserialize;
use strum::{Display, EnumString};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::frame::FrameSample;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointed at the marker.
    #[default]
    Environment,
    User,
}

/// What the consumer asks the host device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: FacingMode,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            width: 1280,
            height: 720,
        }
    }
}

/// A host capture capability.
pub trait CameraDevice: Send + Sync {
    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameStream>, CameraError>;
}

/// A live stream of frames.
pub trait FrameStream: Send {
    /// Next frame, or `None` when none is ready yet.
    fn next_frame(&mut self) -> Result<Option<FrameSample>, CameraError>;

    /// Stop every underlying track.
    fn stop(&mut self);
}

/// Owns an acquired stream until it is released.
///
/// Release happens exactly once: explicitly through [`StreamHandle::release`]
/// or [`CameraManager::release`], or on drop.
pub struct StreamHandle {
    id: Uuid,
    stream: Option<Box<dyn FrameStream>>,
    in_use: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    pub fn next_frame(&mut self) -> Result<Option<FrameSample>, CameraError> {
        match self.stream.as_mut() {
            Some(stream) => stream.next_frame(),
            None => Err(CameraError::DeviceUnavailable(
                "stream already released".to_string(),
            )),
        }
    }

    /// Stop the stream. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            self.in_use.store(false, Ordering::Release);
            metrics::gauge!("camera_streams_active").decrement(1.0);
            info!(stream_id = %self.id, "Camera stream released");
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!(stream_id = %self.id, "Releasing camera stream on drop");
            self.release();
        }
    }
}

/// Acquires and releases the capture device, one stream at a time.
pub struct CameraManager {
    device: Arc<dyn CameraDevice>,
    constraints: CaptureConstraints,
    in_use: Arc<AtomicBool>,
}

impl CameraManager {
    pub fn new(device: Arc<dyn CameraDevice>, constraints: CaptureConstraints) -> Self {
        Self {
            device,
            constraints,
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_acquired(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Open a stream. Fails if one is already held.
    pub fn acquire(&self) -> Result<StreamHandle, CameraError> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CameraError::DeviceUnavailable(
                "camera is already acquired".to_string(),
            ));
        }

        match self.device.open(&self.constraints) {
            Ok(stream) => {
                let handle = StreamHandle {
                    id: Uuid::new_v4(),
                    stream: Some(stream),
                    in_use: Arc::clone(&self.in_use),
                };
                metrics::gauge!("camera_streams_active").increment(1.0);
                info!(
                    stream_id = %handle.id,
                    facing = %self.constraints.facing,
                    width = self.constraints.width,
                    height = self.constraints.height,
                    "Camera stream acquired"
                );
                Ok(handle)
            }
            Err(e) => {
                self.in_use.store(false, Ordering::Release);
                warn!(error = %e, "Camera acquisition failed");
                Err(e)
            }
        }
    }

    /// Release a handle; `None` and already-released handles are no-ops.
    pub fn release(&self, handle: Option<&mut StreamHandle>) {
        if let Some(handle) = handle {
            handle.release();
        }
    }
}

/// Device with no hardware behind it; every open is refused.
pub struct UnavailableCamera;

impl CameraDevice for UnavailableCamera {
    fn open(&self, _: &CaptureConstraints) -> Result<Box<dyn FrameStream>, CameraError> {
        Err(CameraError::DeviceUnavailable(
            "no capture device configured".to_string(),
        ))
    }
}

/// Capture device backed by a directory of still images, replayed in name
/// order and looped.
pub struct DirectoryCamera {
    dir: PathBuf,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn frame_paths(&self) -> Result<Vec<PathBuf>, CameraError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl CameraDevice for DirectoryCamera {
    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameStream>, CameraError> {
        let paths = self.frame_paths()?;
        if paths.is_empty() {
            return Err(CameraError::DeviceUnavailable(format!(
                "no image frames in {}",
                self.dir.display()
            )));
        }
        debug!(
            dir = %self.dir.display(),
            frames = paths.len(),
            facing = %constraints.facing,
            "Opened directory camera"
        );
        Ok(Box::new(DirectoryStream {
            paths,
            cursor: 0,
            max_width: constraints.width,
            max_height: constraints.height,
        }))
    }
}

struct DirectoryStream {
    paths: Vec<PathBuf>,
    cursor: usize,
    max_width: u32,
    max_height: u32,
}

impl FrameStream for DirectoryStream {
    fn next_frame(&mut self) -> Result<Option<FrameSample>, CameraError> {
        if self.paths.is_empty() {
            return Err(CameraError::DeviceUnavailable("stream stopped".to_string()));
        }
        let path = &self.paths[self.cursor % self.paths.len()];
        self.cursor = self.cursor.wrapping_add(1);

        let img = match image::open(path) {
            Ok(img) => img,
            Err(e) => {
                // Skip undecodable files; the next tick tries the next one.
                warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
                return Ok(None);
            }
        };

        let mut rgba = img.to_rgba8();
        if rgba.width() > self.max_width || rgba.height() > self.max_height {
            let scale = (self.max_width as f64 / rgba.width() as f64)
                .min(self.max_height as f64 / rgba.height() as f64);
            let width = ((rgba.width() as f64 * scale) as u32).max(1);
            let height = ((rgba.height() as f64 * scale) as u32).max(1);
            rgba = image::imageops::resize(&rgba, width, height, FilterType::Triangle);
        }

        let (width, height) = rgba.dimensions();
        Ok(FrameSample::from_rgba(width, height, rgba.into_raw()))
    }

    fn stop(&mut self) {
        self.paths.clear();
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "png" | "jpg" | "jpeg" | "webp"
            )
        })
        .unwrap_or(false)
}

fn io_error(dir: &Path, e: io::Error) -> CameraError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => {
            CameraError::PermissionDenied(format!("{}: {}", dir.display(), e))
        }
        _ => CameraError::DeviceUnavailable(format!("{}: {}", dir.display(), e)),
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CameraError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
}
