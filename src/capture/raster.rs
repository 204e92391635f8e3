use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use image::{imageops, imageops::FilterType, RgbaImage};

use super::media::{frame_interval, TrackDefaults, TrackSettings};

/// Off-screen RGBA surface the sampler draws into and the detector reads.
#[derive(Debug, Clone)]
pub struct RasterBuffer {
    image: RgbaImage,
}

/// Pixel copy taken by the detector at the start of a tick.
#[derive(Debug, Clone)]
pub struct RasterSnapshot {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RasterBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Reallocate to `width x height`. Contents are cleared when the size
    /// actually changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if self.dimensions() != (width, height) {
            self.image = RgbaImage::new(width, height);
        }
    }

    /// Draw `frame` over the whole surface, scaling when sizes differ.
    pub fn draw(&mut self, frame: &RgbaImage) {
        if frame.dimensions() == self.dimensions() {
            self.image.copy_from_slice(frame.as_raw());
        } else if frame.width() > 0 && frame.height() > 0 {
            self.image = imageops::resize(frame, self.width(), self.height(), FilterType::Triangle);
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn snapshot(&self) -> RasterSnapshot {
        RasterSnapshot {
            pixels: self.image.as_raw().clone(),
            width: self.width(),
            height: self.height(),
        }
    }
}

/// Everything the sampler and the detector of one scan session share.
#[derive(Debug)]
pub struct ScanSurface {
    buffer: RasterBuffer,
    track: usize,
    fps: f64,
}

pub type SharedSurface = Arc<Mutex<ScanSurface>>;

impl ScanSurface {
    pub fn new(track: usize, settings: &TrackSettings, defaults: &TrackDefaults) -> Self {
        let (width, height) = settings.resolved_size(defaults);
        Self {
            buffer: RasterBuffer::new(width, height),
            track,
            fps: settings.resolved_fps(defaults),
        }
    }

    pub fn shared(self) -> SharedSurface {
        Arc::new(Mutex::new(self))
    }

    /// Point the surface at another track and adopt that track's geometry.
    pub fn select_track(
        &mut self,
        track: usize,
        settings: &TrackSettings,
        defaults: &TrackDefaults,
    ) {
        let (width, height) = settings.resolved_size(defaults);
        self.buffer.resize(width, height);
        self.fps = settings.resolved_fps(defaults);
        self.track = track;
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.fps)
    }

    pub fn buffer(&self) -> &RasterBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut RasterBuffer {
        &mut self.buffer
    }
}

/// Lock the surface, recovering from a poisoned lock: the buffer is
/// overwritten on every tick, so a half-drawn frame is harmless.
pub fn lock_surface(surface: &SharedSurface) -> MutexGuard<'_, ScanSurface> {
    match surface.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
