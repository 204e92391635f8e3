use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{anyhow, bail, Context, Result};
use image::RgbaImage;

use super::media::{MediaSource, TrackSettings};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

struct StillTrack {
    settings: TrackSettings,
    frames: Vec<RgbaImage>,
    cursor: AtomicUsize,
}

/// Replays still images as video tracks, looping over each track's frames.
///
/// Used for kiosk dry runs and for driving the scanner without a camera.
pub struct StillFrameSource {
    tracks: Vec<StillTrack>,
}

impl StillFrameSource {
    pub fn new() -> Self {
        Self { tracks: Vec::new() }
    }

    /// Add a track made of in-memory frames; its size is taken from the first one.
    pub fn with_track(
        mut self,
        label: impl Into<String>,
        frames: Vec<RgbaImage>,
        frame_rate: Option<f64>,
    ) -> Self {
        let (width, height) = frames
            .first()
            .map(|frame| (Some(frame.width()), Some(frame.height())))
            .unwrap_or((None, None));

        self.tracks.push(StillTrack {
            settings: TrackSettings {
                label: label.into(),
                width,
                height,
                frame_rate,
            },
            frames,
            cursor: AtomicUsize::new(0),
        });
        self
    }

    /// One track per directory, frames in file-name order.
    pub fn from_dirs(dirs: &[PathBuf], frame_rate: Option<f64>) -> Result<Self> {
        let mut source = Self::new();
        for dir in dirs {
            let frames = load_frames(dir)?;
            let label = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.display().to_string());
            source = source.with_track(label, frames, frame_rate);
        }
        Ok(source)
    }
}

impl Default for StillFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

fn load_frames(dir: &Path) -> Result<Vec<RgbaImage>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read frame directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("no image frames found in {}", dir.display());
    }

    paths
        .iter()
        .map(|path| {
            image::open(path)
                .map(|img| img.to_rgba8())
                .with_context(|| format!("failed to decode frame {}", path.display()))
        })
        .collect()
}

impl MediaSource for StillFrameSource {
    fn tracks(&self) -> Vec<TrackSettings> {
        self.tracks.iter().map(|track| track.settings.clone()).collect()
    }

    fn grab_frame(&self, track: usize) -> Result<Option<RgbaImage>> {
        let track = self
            .tracks
            .get(track)
            .ok_or_else(|| anyhow!("track {track} does not exist"))?;
        if track.frames.is_empty() {
            return Ok(None);
        }
        let index = track.cursor.fetch_add(1, Ordering::Relaxed) % track.frames.len();
        Ok(Some(track.frames[index].clone()))
    }
}
