use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    attendance::AttendanceToggle,
    capture::{lock_surface, SharedSurface},
    settings::{DetectionPolicy, KnownBadCadence},
    storage::AttendanceStore,
};

use super::{
    decoder::CodeDecoder,
    feedback::{DetectionError, DetectionFeedback},
    resolver::{Resolution, Resolver},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    pub group_id: String,
    pub policy: DetectionPolicy,
    pub known_bad: KnownBadCadence,
    /// Pause after a toggle in continuous mode.
    pub rearm_delay: Duration,
}

/// What one pass over the raster buffer amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Miss,
    Suppressed,
    Unknown,
    LookupFailed,
    Toggled { member_id: String, started: bool },
    ToggleFailed { member_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTick {
    After(Duration),
    Immediately,
    /// Wait for the operator to resume scanning.
    Hold,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub ticks: u64,
    pub misses: u64,
    pub suppressed: u64,
    pub unknown: u64,
    pub lookup_failures: u64,
    pub toggles: u64,
    pub toggle_failures: u64,
}

impl ScanStats {
    fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Miss => self.misses += 1,
            TickOutcome::Suppressed => self.suppressed += 1,
            TickOutcome::Unknown => self.unknown += 1,
            TickOutcome::LookupFailed => self.lookup_failures += 1,
            TickOutcome::Toggled { .. } => self.toggles += 1,
            TickOutcome::ToggleFailed { .. } => self.toggle_failures += 1,
        }
    }
}

/// Code Detector & Resolver for one scanning session.
pub struct Detector<S> {
    config: DetectorConfig,
    surface: SharedSurface,
    decoder: Arc<dyn CodeDecoder>,
    resolver: Resolver<S>,
    toggle: AttendanceToggle<S>,
    feedback: Arc<dyn DetectionFeedback>,
    stats: ScanStats,
}

impl<S: AttendanceStore + Clone> Detector<S> {
    pub fn new(
        config: DetectorConfig,
        surface: SharedSurface,
        decoder: Arc<dyn CodeDecoder>,
        toggle: AttendanceToggle<S>,
        feedback: Arc<dyn DetectionFeedback>,
    ) -> Self {
        let resolver = Resolver::new(toggle.store().clone(), config.group_id.clone());
        Self {
            config,
            surface,
            decoder,
            resolver,
            toggle,
            feedback,
            stats: ScanStats::default(),
        }
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Decode the current frame and act on whatever it holds.
    pub async fn scan_tick(&mut self) -> TickOutcome {
        let outcome = self.detect().await;
        self.stats.record(&outcome);
        outcome
    }

    async fn detect(&mut self) -> TickOutcome {
        let Some(payload) = self.decode_frame().await else {
            return TickOutcome::Miss;
        };

        let member = match self.resolver.resolve(&payload).await {
            Ok(Resolution::Known(member)) => member,
            Ok(Resolution::Suppressed) => {
                log_debug!("ignoring known-bad code {payload:?}");
                return TickOutcome::Suppressed;
            }
            Ok(Resolution::Unknown) => {
                log_info!("code {payload:?} matches no member of the group");
                self.feedback
                    .on_detect_error(&DetectionError::UnknownPayload { payload });
                return TickOutcome::Unknown;
            }
            Err(err) => {
                log_warn!("member lookup for {payload:?} failed: {err:#}");
                self.feedback.on_detect_error(&DetectionError::Lookup {
                    payload,
                    message: format!("{err:#}"),
                });
                return TickOutcome::LookupFailed;
            }
        };

        let result = self.toggle.toggle(&self.config.group_id, &member.id).await;
        self.resolver.invalidate(&member.id);

        match result {
            Ok(outcome) => {
                self.feedback.on_detect_success(&member, &outcome);
                TickOutcome::Toggled {
                    member_id: member.id,
                    started: outcome.is_started(),
                }
            }
            Err(err) => {
                log_warn!("toggle for member {} failed: {err:#}", member.id);
                self.feedback.on_detect_error(&DetectionError::Toggle {
                    member_id: member.id.clone(),
                    message: err.to_string(),
                });
                TickOutcome::ToggleFailed {
                    member_id: member.id,
                }
            }
        }
    }

    /// Snapshot the buffer and decode it on the blocking pool. A panicking
    /// decoder or an empty payload counts as a miss.
    async fn decode_frame(&self) -> Option<String> {
        let snapshot = lock_surface(&self.surface).buffer().snapshot();
        let decoder = Arc::clone(&self.decoder);

        let decoded = tokio::task::spawn_blocking(move || {
            decoder.decode(&snapshot.pixels, snapshot.width, snapshot.height)
        })
        .await;

        match decoded {
            Ok(Some(decoded)) => {
                let payload = decoded.data.trim();
                (!payload.is_empty()).then(|| payload.to_string())
            }
            Ok(None) => None,
            Err(err) if err.is_panic() => {
                log_error!("decoder panicked, treating frame as a miss");
                None
            }
            Err(err) => {
                log_warn!("decode task did not complete: {err}");
                None
            }
        }
    }

    pub fn next_tick(&self, outcome: &TickOutcome) -> NextTick {
        let frame = lock_surface(&self.surface).frame_interval();
        match outcome {
            TickOutcome::Suppressed => match self.config.known_bad {
                KnownBadCadence::FrameDelay => NextTick::After(frame),
                KnownBadCadence::Immediate => NextTick::Immediately,
            },
            TickOutcome::Toggled { .. } => match self.config.policy {
                DetectionPolicy::Continuous => NextTick::After(self.config.rearm_delay),
                DetectionPolicy::HandOff => NextTick::Hold,
            },
            TickOutcome::Miss
            | TickOutcome::Unknown
            | TickOutcome::LookupFailed
            | TickOutcome::ToggleFailed { .. } => NextTick::After(frame),
        }
    }

    /// Tick until cancelled. Ticks never overlap: the next one is scheduled
    /// only after the previous tick, lookup and toggle included, finished.
    ///
    /// `hold` is raised when hand-off mode halts the loop; lowering it
    /// resumes scanning.
    pub async fn run(
        mut self,
        hold: Arc<watch::Sender<bool>>,
        cancel: CancellationToken,
    ) -> ScanStats {
        log_info!("detector started for group {}", self.config.group_id);

        while !cancel.is_cancelled() {
            let outcome = self.scan_tick().await;
            if cancel.is_cancelled() {
                break;
            }

            match self.next_tick(&outcome) {
                NextTick::After(delay) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                NextTick::Immediately => tokio::task::yield_now().await,
                NextTick::Hold => {
                    hold.send_replace(true);
                    log_info!("detector halted, waiting for the operator");
                    if !wait_for_release(&hold, &cancel).await {
                        break;
                    }
                }
            }
        }

        log_info!(
            "detector shutting down after {} ticks ({} toggles)",
            self.stats.ticks,
            self.stats.toggles
        );
        self.stats
    }
}

/// Returns false when cancelled while halted.
async fn wait_for_release(hold: &watch::Sender<bool>, cancel: &CancellationToken) -> bool {
    let mut released = hold.subscribe();
    loop {
        let halted = *released.borrow_and_update();
        if !halted {
            return true;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = released.changed() => {}
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedDecoder;
    use super::*;
    use crate::{
        capture::{ScanSurface, TrackDefaults, TrackSettings},
        db::models::{
            ActivityContent, ActivityRecord, ActivityStatus, ActivityType,
        },
        scanner::{decoder::Decoded, feedback::testing::RecordingFeedback},
        storage::testing::{MockStore, StoreCall},
    };
    use assert_matches::assert_matches;
    use chrono::Utc;

    const GROUP: &str = "group-1";

    struct Fixture {
        store: Arc<MockStore>,
        feedback: Arc<RecordingFeedback>,
        detector: Detector<Arc<MockStore>>,
    }

    fn surface(fps: f64) -> SharedSurface {
        let track = TrackSettings {
            label: "front".into(),
            width: Some(8),
            height: Some(8),
            frame_rate: Some(fps),
        };
        ScanSurface::new(0, &track, &TrackDefaults::default()).shared()
    }

    fn config(policy: DetectionPolicy, known_bad: KnownBadCadence) -> DetectorConfig {
        DetectorConfig {
            group_id: GROUP.into(),
            policy,
            known_bad,
            rearm_delay: Duration::from_millis(20),
        }
    }

    fn fixture_with(
        store: MockStore,
        decoder: Arc<dyn CodeDecoder>,
        config: DetectorConfig,
    ) -> Fixture {
        let store = Arc::new(store);
        let feedback = Arc::new(RecordingFeedback::default());
        let detector = Detector::new(
            config,
            surface(30.0),
            decoder,
            AttendanceToggle::new(store.clone()),
            feedback.clone(),
        );
        Fixture {
            store,
            feedback,
            detector,
        }
    }

    fn fixture(store: MockStore, decoder: ScriptedDecoder) -> Fixture {
        fixture_with(
            store,
            Arc::new(decoder),
            config(DetectionPolicy::Continuous, KnownBadCadence::FrameDelay),
        )
    }

    #[tokio::test]
    async fn fresh_member_detection_creates_a_running_record() {
        let mut f = fixture(
            MockStore::new().with_member("member-42", "Alice"),
            ScriptedDecoder::new([Some("member-42")]),
        );

        let outcome = f.detector.scan_tick().await;
        assert_eq!(
            outcome,
            TickOutcome::Toggled {
                member_id: "member-42".into(),
                started: true
            }
        );

        let creates = f.store.creates();
        assert_eq!(creates.len(), 1);
        assert_matches!(
            &creates[0],
            StoreCall::CreateActivity { member_id, content }
                if member_id == "member-42"
                    && content.status == ActivityStatus::Running
                    && content.end_time.is_none()
        );
        assert_eq!(f.feedback.success_count(), 1);
        assert_eq!(f.feedback.error_count(), 0);
        assert_eq!(
            f.detector.next_tick(&outcome),
            NextTick::After(Duration::from_millis(20))
        );
    }

    #[tokio::test]
    async fn running_member_detection_closes_the_open_record() {
        let open = ActivityRecord {
            id: "act-7".into(),
            activity_type: ActivityType::Work,
            content: ActivityContent::started(Utc::now()),
            member_id: "member-42".into(),
        };
        let mut f = fixture(
            MockStore::new()
                .with_member("member-42", "Alice")
                .with_activity(open),
            ScriptedDecoder::new([Some("member-42")]),
        );

        assert_matches!(
            f.detector.scan_tick().await,
            TickOutcome::Toggled { started: false, .. }
        );
        let patches = f.store.patches();
        assert_eq!(patches.len(), 1);
        assert_matches!(
            &patches[0],
            StoreCall::PatchActivity { activity_id, patch }
                if activity_id == "act-7"
                    && patch.status == Some(ActivityStatus::Done)
                    && patch.end_time.is_some()
        );
        assert!(f.store.creates().is_empty());
        assert_eq!(f.store.activities().len(), 1);
    }

    #[tokio::test]
    async fn unknown_code_is_looked_up_once_and_signalled_once() {
        let mut f = fixture(MockStore::new(), ScriptedDecoder::always("stranger"));

        assert_eq!(f.detector.scan_tick().await, TickOutcome::Unknown);
        for _ in 0..4 {
            let outcome = f.detector.scan_tick().await;
            assert_eq!(outcome, TickOutcome::Suppressed);
            assert_eq!(
                f.detector.next_tick(&outcome),
                NextTick::After(Duration::from_secs_f64(1.0 / 30.0))
            );
        }

        assert_eq!(f.store.lookups_for("stranger"), 1);
        assert_eq!(
            f.feedback.errors(),
            vec![DetectionError::UnknownPayload {
                payload: "stranger".into()
            }]
        );
        assert_eq!(f.detector.stats().suppressed, 4);
    }

    #[tokio::test]
    async fn immediate_cadence_rescans_known_bad_codes_without_delay() {
        let f = fixture_with(
            MockStore::new(),
            Arc::new(ScriptedDecoder::default()),
            config(DetectionPolicy::Continuous, KnownBadCadence::Immediate),
        );
        assert_eq!(
            f.detector.next_tick(&TickOutcome::Suppressed),
            NextTick::Immediately
        );
        assert_eq!(
            f.detector.next_tick(&TickOutcome::Miss),
            NextTick::After(Duration::from_secs_f64(1.0 / 30.0))
        );
    }

    #[tokio::test]
    async fn lookup_failures_are_retried_on_later_ticks() {
        let mut f = fixture(
            MockStore::new().with_member("member-42", "Alice"),
            ScriptedDecoder::always("member-42"),
        );

        f.store.fail_lookups(true);
        assert_eq!(f.detector.scan_tick().await, TickOutcome::LookupFailed);
        assert_matches!(&f.feedback.errors()[0], DetectionError::Lookup { .. });

        f.store.fail_lookups(false);
        assert_matches!(f.detector.scan_tick().await, TickOutcome::Toggled { .. });
    }

    #[tokio::test]
    async fn failed_toggle_signals_an_error_and_keeps_the_code_usable() {
        let mut f = fixture(
            MockStore::new().with_member("member-42", "Alice"),
            ScriptedDecoder::always("member-42"),
        );

        f.store.fail_writes(true);
        assert_eq!(
            f.detector.scan_tick().await,
            TickOutcome::ToggleFailed {
                member_id: "member-42".into()
            }
        );
        assert_eq!(f.feedback.success_count(), 0);
        assert_matches!(
            &f.feedback.errors()[0],
            DetectionError::Toggle { member_id, .. } if member_id == "member-42"
        );
        assert_eq!(f.store.running_count("member-42"), 0);

        f.store.fail_writes(false);
        assert_matches!(
            f.detector.scan_tick().await,
            TickOutcome::Toggled { started: true, .. }
        );
    }

    #[tokio::test]
    async fn misses_blank_payloads_and_panics_do_not_escape_the_tick() {
        let mut f = fixture(
            MockStore::new().with_member("member-42", "Alice"),
            ScriptedDecoder::new([None, Some("   ")]),
        );
        assert_eq!(f.detector.scan_tick().await, TickOutcome::Miss);
        assert_eq!(f.detector.scan_tick().await, TickOutcome::Miss);

        let panicking = |_: &[u8], _: u32, _: u32| -> Option<Decoded> { panic!("corrupt frame") };
        let mut p = fixture_with(
            MockStore::new(),
            Arc::new(panicking),
            config(DetectionPolicy::Continuous, KnownBadCadence::FrameDelay),
        );
        assert_eq!(p.detector.scan_tick().await, TickOutcome::Miss);
        assert_eq!(p.detector.scan_tick().await, TickOutcome::Miss);
        assert_eq!(p.detector.stats().misses, 2);
        assert!(p.store.calls().is_empty());
    }

    #[tokio::test]
    async fn hand_off_policy_holds_until_released() {
        let decoder = Arc::new(ScriptedDecoder::always("member-42"));
        let f = fixture_with(
            MockStore::new().with_member("member-42", "Alice"),
            decoder.clone(),
            config(DetectionPolicy::HandOff, KnownBadCadence::FrameDelay),
        );
        let hold = Arc::new(watch::channel(false).0);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(f.detector.run(hold.clone(), cancel.clone()));

        let mut halted = hold.subscribe();
        tokio::time::timeout(Duration::from_secs(2), halted.wait_for(|h| *h))
            .await
            .unwrap()
            .unwrap();
        drop(halted);

        let calls = decoder.calls();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(decoder.calls(), calls);
        assert_eq!(f.store.creates().len(), 1);

        hold.send_replace(false);
        tokio::time::timeout(Duration::from_secs(2), async {
            while f.store.patches().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(stats.toggles, 2);
        assert_eq!(f.store.running_count("member-42"), 0);
    }
}
