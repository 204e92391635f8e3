use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const FADE_SAMPLES: usize = 220;

/// Which cue to play after a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Success,
    Error,
}

/// (frequency Hz, duration ms); a zero frequency is a rest.
type Note = (f32, u64);

const SUCCESS_NOTES: &[Note] = &[(880.0, 90), (1318.5, 140)];
const ERROR_NOTES: &[Note] = &[(220.0, 120), (0.0, 60), (220.0, 160)];

/// Short, finite mono tone sequence.
pub struct Chime {
    samples: Vec<f32>,
    position: usize,
}

impl Chime {
    pub fn for_cue(cue: Cue) -> Self {
        match cue {
            Cue::Success => Self::from_notes(SUCCESS_NOTES, 0.35),
            Cue::Error => Self::from_notes(ERROR_NOTES, 0.3),
        }
    }

    fn from_notes(notes: &[Note], amplitude: f32) -> Self {
        let mut samples = Vec::new();
        for &(freq, millis) in notes {
            let len = (SAMPLE_RATE as u64 * millis / 1000) as usize;
            let fade = FADE_SAMPLES.min(len / 2).max(1);
            for n in 0..len {
                if freq <= 0.0 {
                    samples.push(0.0);
                    continue;
                }
                // Linear attack/release so notes don't click.
                let envelope = (n.min(len - 1 - n) as f32 / fade as f32).min(1.0);
                let t = n as f32 / SAMPLE_RATE as f32;
                samples.push((2.0 * PI * freq * t).sin() * amplitude * envelope);
            }
        }
        Self {
            samples,
            position: 0,
        }
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.samples.get(self.position).copied();
        self.position += 1;
        sample
    }
}

impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples.len().saturating_sub(self.position))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.samples.len() as f64 / SAMPLE_RATE as f64,
        ))
    }
}
