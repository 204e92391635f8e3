//! Media capture seam: a stream of zero or more video tracks.

use std::time::Duration;

use anyhow::Result;
use image::RgbaImage;
use serde::Serialize;

pub const DEFAULT_FPS: f64 = 30.0;
pub const DEFAULT_WIDTH: u32 = 100;
pub const DEFAULT_HEIGHT: u32 = 100;

/// Usable frame rates. Anything outside is clamped so the tick period never
/// collapses to zero or overflows a `Duration`.
pub const MIN_FPS: f64 = 1.0;
pub const MAX_FPS: f64 = 240.0;

/// Settings a track reports. Cameras are free to omit any of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSettings {
    pub label: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
}

/// Values substituted for missing track settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackDefaults {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for TrackDefaults {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl TrackSettings {
    pub fn resolved_fps(&self, defaults: &TrackDefaults) -> f64 {
        let fps = match self.frame_rate {
            Some(fps) if fps.is_finite() && fps > 0.0 => fps,
            _ => defaults.fps,
        };
        usable_fps(fps)
    }

    pub fn resolved_size(&self, defaults: &TrackDefaults) -> (u32, u32) {
        let width = self.width.filter(|w| *w > 0).unwrap_or(defaults.width);
        let height = self.height.filter(|h| *h > 0).unwrap_or(defaults.height);
        (width, height)
    }
}

fn usable_fps(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        fps.clamp(MIN_FPS, MAX_FPS)
    } else {
        DEFAULT_FPS
    }
}

/// Time between two frames at `fps`. Non-positive rates fall back to 30 fps
/// and the rest are clamped to `MIN_FPS..=MAX_FPS`.
pub fn frame_interval(fps: f64) -> Duration {
    Duration::from_secs_f64(1.0 / usable_fps(fps))
}

/// A live capture stream.
///
/// `grab_frame` returns `Ok(None)` while the track has nothing decodable yet.
pub trait MediaSource: Send + Sync + 'static {
    fn tracks(&self) -> Vec<TrackSettings>;

    fn grab_frame(&self, track: usize) -> Result<Option<RgbaImage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_track() -> TrackSettings {
        TrackSettings {
            label: "usb".into(),
            width: None,
            height: None,
            frame_rate: None,
        }
    }

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let defaults = TrackDefaults::default();
        let track = bare_track();
        assert_eq!(track.resolved_fps(&defaults), 30.0);
        assert_eq!(track.resolved_size(&defaults), (100, 100));

        let zero = TrackSettings {
            width: Some(0),
            frame_rate: Some(0.0),
            ..bare_track()
        };
        assert_eq!(zero.resolved_fps(&defaults), 30.0);
        assert_eq!(zero.resolved_size(&defaults).0, 100);
    }

    #[test]
    fn frame_interval_follows_rate() {
        assert_eq!(frame_interval(25.0), Duration::from_millis(40));
        assert_eq!(frame_interval(f64::NAN), frame_interval(DEFAULT_FPS));
    }

    #[test]
    fn extreme_rates_are_clamped_to_a_usable_period() {
        let fastest = frame_interval(1e12);
        assert!(fastest > Duration::ZERO);
        assert_eq!(fastest, frame_interval(MAX_FPS));

        assert_eq!(frame_interval(1e-30), Duration::from_secs(1));
        assert_eq!(frame_interval(f64::MIN_POSITIVE), frame_interval(MIN_FPS));
    }

    #[test]
    fn extreme_track_and_default_rates_resolve_in_range() {
        let fast_track = TrackSettings {
            frame_rate: Some(1e12),
            ..bare_track()
        };
        assert_eq!(fast_track.resolved_fps(&TrackDefaults::default()), MAX_FPS);

        let slow_defaults = TrackDefaults {
            fps: 1e-30,
            ..TrackDefaults::default()
        };
        assert_eq!(bare_track().resolved_fps(&slow_defaults), MIN_FPS);
    }

    #[tokio::test]
    async fn interval_accepts_the_fastest_period() {
        let mut ticker = tokio::time::interval(frame_interval(f64::MAX));
        ticker.tick().await;
        ticker.tick().await;
    }
}
