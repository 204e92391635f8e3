use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    attendance::AttendanceToggle,
    capture::{
        frame_sampler, lock_surface, MediaSource, ScanSurface, SharedSurface, TrackDefaults,
        TrackSettings,
    },
    storage::AttendanceStore,
};

use super::{
    decoder::CodeDecoder,
    feedback::DetectionFeedback,
    loop_worker::{Detector, DetectorConfig, ScanStats},
    ScanError,
};

/// Tasks and shared state of one scanning session. The Unknown-Payload Set
/// lives inside the detector task and dies with it.
struct ScanSession {
    surface: SharedSurface,
    cancel_token: CancellationToken,
    hold: Arc<watch::Sender<bool>>,
    sampler: Option<JoinHandle<()>>,
    detector: Option<JoinHandle<ScanStats>>,
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Owns the frame sampler and the detector for the selected track.
pub struct ScannerController<S> {
    source: Arc<dyn MediaSource>,
    toggle: AttendanceToggle<S>,
    decoder: Arc<dyn CodeDecoder>,
    feedback: Arc<dyn DetectionFeedback>,
    defaults: TrackDefaults,
    config: DetectorConfig,
    session: Option<ScanSession>,
}

impl<S: AttendanceStore + Clone> ScannerController<S> {
    pub fn new(
        source: Arc<dyn MediaSource>,
        toggle: AttendanceToggle<S>,
        decoder: Arc<dyn CodeDecoder>,
        feedback: Arc<dyn DetectionFeedback>,
        defaults: TrackDefaults,
        config: DetectorConfig,
    ) -> Self {
        Self {
            source,
            toggle,
            decoder,
            feedback,
            defaults,
            config,
            session: None,
        }
    }

    pub fn tracks(&self) -> Vec<TrackSettings> {
        self.source.tracks()
    }

    fn track_settings(&self, index: usize) -> Result<TrackSettings, ScanError> {
        let tracks = self.source.tracks();
        if tracks.is_empty() {
            return Err(ScanError::NoTracks);
        }
        let available = tracks.len();
        tracks
            .into_iter()
            .nth(index)
            .ok_or(ScanError::TrackOutOfRange { index, available })
    }

    /// Start sampling `track` and scanning it. Must be called from within a
    /// Tokio runtime.
    pub fn start(&mut self, track: usize) -> Result<(), ScanError> {
        if self.session.is_some() {
            return Err(ScanError::AlreadyActive);
        }
        let settings = self.track_settings(track)?;

        let surface = ScanSurface::new(track, &settings, &self.defaults).shared();
        let cancel_token = CancellationToken::new();
        let (hold, _) = watch::channel(false);
        let hold = Arc::new(hold);

        let sampler = tokio::spawn(frame_sampler(
            Arc::clone(&self.source),
            Arc::clone(&surface),
            cancel_token.clone(),
        ));

        let detector = Detector::new(
            self.config.clone(),
            Arc::clone(&surface),
            Arc::clone(&self.decoder),
            self.toggle.clone(),
            Arc::clone(&self.feedback),
        );
        let detector = tokio::spawn(detector.run(Arc::clone(&hold), cancel_token.clone()));

        info!(
            "Scanning track {track} ({}) for group {}",
            settings.label, self.config.group_id
        );

        self.session = Some(ScanSession {
            surface,
            cancel_token,
            hold,
            sampler: Some(sampler),
            detector: Some(detector),
        });
        Ok(())
    }

    /// Move the session to another track. The raster buffer takes the new
    /// track's dimensions before the detector's next snapshot.
    pub fn switch_track(&mut self, track: usize) -> Result<(), ScanError> {
        let settings = self.track_settings(track)?;
        let session = self.session.as_ref().ok_or(ScanError::NotActive)?;
        lock_surface(&session.surface).select_track(track, &settings, &self.defaults);
        info!("Switched scanning to track {track} ({})", settings.label);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Whether a hand-off detection is waiting for the operator.
    pub fn is_halted(&self) -> bool {
        self.session
            .as_ref()
            .map(|session| *session.hold.borrow())
            .unwrap_or(false)
    }

    /// Release a hand-off halt. Returns false when nothing was halted.
    pub fn resume(&self) -> bool {
        match &self.session {
            Some(session) if *session.hold.borrow() => {
                session.hold.send_replace(false);
                info!("Scanning resumed by operator");
                true
            }
            _ => false,
        }
    }

    pub fn active_track(&self) -> Option<usize> {
        self.session
            .as_ref()
            .map(|session| lock_surface(&session.surface).track())
    }

    pub fn surface_dimensions(&self) -> Option<(u32, u32)> {
        self.session
            .as_ref()
            .map(|session| lock_surface(&session.surface).buffer().dimensions())
    }

    /// Cancel both tasks and wait for them. Once this returns no further
    /// draw or decode happens.
    pub async fn stop(&mut self) -> Result<Option<ScanStats>> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };
        session.cancel_token.cancel();

        // Join both before reporting either failure.
        let sampler = match session.sampler.take() {
            Some(sampler) => sampler.await.context("frame sampler task failed to join"),
            None => Ok(()),
        };
        let detector = match session.detector.take() {
            Some(detector) => detector.await.context("detector task failed to join"),
            None => Ok(ScanStats::default()),
        };
        sampler?;
        let stats = detector?;

        info!(
            "Scanning stopped: {} ticks, {} toggles, {} unknown codes",
            stats.ticks, stats.toggles, stats.unknown
        );
        Ok(Some(stats))
    }
}
