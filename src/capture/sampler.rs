use std::sync::Arc;

use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{
    media::MediaSource,
    raster::{lock_surface, SharedSurface},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

fn ticker_for(surface: &SharedSurface) -> Interval {
    let period = lock_surface(surface).frame_interval();
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Copy the selected track into the surface once per frame until cancelled.
///
/// The tick period follows the surface's frame rate, so a track switch to a
/// camera with another rate takes effect on the next tick.
pub async fn frame_sampler(
    source: Arc<dyn MediaSource>,
    surface: SharedSurface,
    cancel_token: CancellationToken,
) {
    let mut ticker = ticker_for(&surface);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("frame sampler shutting down");
                break;
            }
            _ = ticker.tick() => {
                sample_once(source.as_ref(), &surface);

                if lock_surface(&surface).frame_interval() != ticker.period() {
                    ticker = ticker_for(&surface);
                }
            }
        }
    }
}

/// Draw the current frame of the selected track. Returns whether anything
/// was drawn; a missing frame or a source error is a no-op for this tick.
pub fn sample_once(source: &dyn MediaSource, surface: &SharedSurface) -> bool {
    let track = lock_surface(surface).track();

    let frame = match source.grab_frame(track) {
        Ok(Some(frame)) => frame,
        Ok(None) => return false,
        Err(err) => {
            log_debug!("frame grab on track {track} failed: {err:#}");
            return false;
        }
    };

    let mut guard = lock_surface(surface);
    if guard.track() != track {
        // Track switched while grabbing; this frame has the wrong geometry.
        return false;
    }
    guard.buffer_mut().draw(&frame);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        media::{TrackDefaults, TrackSettings},
        raster::ScanSurface,
    };
    use anyhow::{bail, Result};
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SolidSource {
        grabs: AtomicUsize,
        mode: &'static str,
    }

    impl SolidSource {
        fn new(mode: &'static str) -> Self {
            Self {
                grabs: AtomicUsize::new(0),
                mode,
            }
        }
    }

    impl MediaSource for SolidSource {
        fn tracks(&self) -> Vec<TrackSettings> {
            vec![TrackSettings {
                label: "solid".into(),
                width: Some(4),
                height: Some(4),
                frame_rate: Some(100.0),
            }]
        }

        fn grab_frame(&self, _track: usize) -> Result<Option<RgbaImage>> {
            self.grabs.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                "empty" => Ok(None),
                "broken" => bail!("camera unplugged"),
                _ => Ok(Some(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255])))),
            }
        }
    }

    fn surface_for(source: &dyn MediaSource) -> SharedSurface {
        ScanSurface::new(0, &source.tracks()[0], &TrackDefaults::default()).shared()
    }

    #[test]
    fn missing_frames_and_errors_leave_the_buffer_alone() {
        for mode in ["empty", "broken"] {
            let source = SolidSource::new(mode);
            let surface = surface_for(&source);
            assert!(!sample_once(&source, &surface));
            assert!(lock_surface(&surface)
                .buffer()
                .image()
                .pixels()
                .all(|p| p.0 == [0, 0, 0, 0]));
        }
    }

    #[test]
    fn frames_are_drawn_into_the_surface() {
        let source = SolidSource::new("solid");
        let surface = surface_for(&source);
        assert!(sample_once(&source, &surface));
        assert_eq!(
            lock_surface(&surface).buffer().image().get_pixel(0, 0),
            &Rgba([9, 9, 9, 255])
        );
    }

    #[tokio::test]
    async fn sampler_stops_drawing_once_cancelled() {
        let source = Arc::new(SolidSource::new("solid"));
        let surface = surface_for(source.as_ref());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(frame_sampler(source.clone(), surface, cancel.clone()));
        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        let grabs = source.grabs.load(Ordering::SeqCst);
        assert!(grabs > 0);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(source.grabs.load(Ordering::SeqCst), grabs);
    }
}
