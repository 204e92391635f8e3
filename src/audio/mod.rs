pub mod chime;

pub use chime::{Chime, Cue};

use anyhow::{anyhow, Result};
use log::warn;
use rodio::{OutputStream, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

/// Plays detection cues on a dedicated thread that owns the non-`Send`
/// output stream. The device is opened lazily on the first cue; when no
/// output device exists cues are dropped with a warning. The thread exits
/// once every clone of the player is gone.
#[derive(Clone)]
pub struct CuePlayer {
    tx: Arc<Mutex<Option<Sender<Cue>>>>,
    volume: f32,
}

impl CuePlayer {
    pub fn new(volume: f32) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            volume: volume.clamp(0.0, 1.0),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<Cue>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("audio command channel poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<Cue>();
        let volume = self.volume;

        thread::Builder::new()
            .name("rollcall-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                    volume: f32,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        new_sink.set_volume(volume);
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cue) = rx.recv() {
                    if let Err(err) = ensure_sink(&mut _stream, &mut sink, volume) {
                        warn!("{err}; detection cues disabled");
                        break;
                    }
                    if let Some(ref s) = sink {
                        s.append(Chime::for_cue(cue));
                    }
                }

                // Let the last cue finish before the stream is dropped.
                if let Some(s) = sink.take() {
                    s.sleep_until_end();
                }
            })?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    /// Queue a cue. Fails only when the audio thread cannot be started;
    /// after the device has failed, cues are silently dropped.
    pub fn play(&self, cue: Cue) -> Result<()> {
        let tx = self.ensure_thread()?;
        // A closed channel means the device failed and cues are disabled.
        let _ = tx.send(cue);
        Ok(())
    }
}
