//! Detection feedback: the signals the scanner emits after each resolved
//! payload, plus the adapters that turn them into sound, log lines or
//! channel messages for a UI.

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    attendance::ToggleOutcome,
    audio::{CuePlayer, Cue},
    db::models::MemberIdentity,
};

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum DetectionError {
    #[error("no member matches code {payload:?}")]
    UnknownPayload { payload: String },
    #[error("member lookup for {payload:?} failed: {message}")]
    Lookup { payload: String, message: String },
    #[error("attendance toggle for {member_id} failed: {message}")]
    Toggle { member_id: String, message: String },
}

pub trait DetectionFeedback: Send + Sync + 'static {
    fn on_detect_success(&self, member: &MemberIdentity, outcome: &ToggleOutcome);
    fn on_detect_error(&self, error: &DetectionError);
}

impl<F: DetectionFeedback + ?Sized> DetectionFeedback for Arc<F> {
    fn on_detect_success(&self, member: &MemberIdentity, outcome: &ToggleOutcome) {
        (**self).on_detect_success(member, outcome)
    }

    fn on_detect_error(&self, error: &DetectionError) {
        (**self).on_detect_error(error)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl DetectionFeedback for LogFeedback {
    fn on_detect_success(&self, member: &MemberIdentity, outcome: &ToggleOutcome) {
        let verb = if outcome.is_started() {
            "clocked in"
        } else {
            "clocked out"
        };
        info!("{} ({}) {verb}", member.data.name, member.id);
    }

    fn on_detect_error(&self, error: &DetectionError) {
        warn!("{error}");
    }
}

pub struct ChimeFeedback {
    player: CuePlayer,
}

impl ChimeFeedback {
    pub fn new(player: CuePlayer) -> Self {
        Self { player }
    }

    fn play(&self, cue: Cue) {
        if let Err(err) = self.player.play(cue) {
            warn!("could not play {cue:?} cue: {err:#}");
        }
    }
}

impl DetectionFeedback for ChimeFeedback {
    fn on_detect_success(&self, _member: &MemberIdentity, _outcome: &ToggleOutcome) {
        self.play(Cue::Success);
    }

    fn on_detect_error(&self, _error: &DetectionError) {
        self.play(Cue::Error);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum ScanEvent {
    Detected {
        member: MemberIdentity,
        outcome: ToggleOutcome,
    },
    Failed {
        error: DetectionError,
    },
}

/// Forwards signals to a UI task. Never blocks the scan loop: when the
/// receiver is gone or full the event is dropped.
pub struct ChannelFeedback {
    tx: mpsc::Sender<ScanEvent>,
}

impl ChannelFeedback {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ScanEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    fn send(&self, event: ScanEvent) {
        let _ = self.tx.try_send(event);
    }
}

impl DetectionFeedback for ChannelFeedback {
    fn on_detect_success(&self, member: &MemberIdentity, outcome: &ToggleOutcome) {
        self.send(ScanEvent::Detected {
            member: member.clone(),
            outcome: outcome.clone(),
        });
    }

    fn on_detect_error(&self, error: &DetectionError) {
        self.send(ScanEvent::Failed {
            error: error.clone(),
        });
    }
}

/// Delivers every signal to each inner sink, in order.
#[derive(Default)]
pub struct FanoutFeedback {
    sinks: Vec<Box<dyn DetectionFeedback>>,
}

impl FanoutFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl DetectionFeedback) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl DetectionFeedback for FanoutFeedback {
    fn on_detect_success(&self, member: &MemberIdentity, outcome: &ToggleOutcome) {
        for sink in &self.sinks {
            sink.on_detect_success(member, outcome);
        }
    }

    fn on_detect_error(&self, error: &DetectionError) {
        for sink in &self.sinks {
            sink.on_detect_error(error);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingFeedback;
    use super::*;
    use crate::db::models::{ActivityContent, ActivityRecord, ActivityType, Member, MemberRole};
    use chrono::Utc;

    fn alice() -> MemberIdentity {
        MemberIdentity {
            id: "member-42".into(),
            data: Member::new("Alice", MemberRole::Member, Utc::now()),
        }
    }

    fn started() -> ToggleOutcome {
        ToggleOutcome::Started(ActivityRecord {
            id: "act-1".into(),
            activity_type: ActivityType::Work,
            content: ActivityContent::started(Utc::now()),
            member_id: "member-42".into(),
        })
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(RecordingFeedback::default());
        let b = Arc::new(RecordingFeedback::default());
        let fanout = FanoutFeedback::new().with(a.clone()).with(b.clone()).with(LogFeedback);

        fanout.on_detect_success(&alice(), &started());
        fanout.on_detect_error(&DetectionError::UnknownPayload {
            payload: "x".into(),
        });

        for sink in [a, b] {
            assert_eq!(sink.success_count(), 1);
            assert_eq!(sink.error_count(), 1);
        }
    }

    #[tokio::test]
    async fn channel_feedback_forwards_and_drops_when_full() {
        let (feedback, mut rx) = ChannelFeedback::new(1);
        feedback.on_detect_success(&alice(), &started());
        feedback.on_detect_error(&DetectionError::UnknownPayload {
            payload: "x".into(),
        });

        match rx.recv().await.unwrap() {
            ScanEvent::Detected { member, outcome } => {
                assert_eq!(member.id, "member-42");
                assert!(outcome.is_started());
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let event = ScanEvent::Failed {
            error: DetectionError::UnknownPayload {
                payload: "x".into(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "failed");
        assert_eq!(json["error"]["kind"], "unknownPayload");
    }
}
