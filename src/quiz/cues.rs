use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Mutex;

use log::debug;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::quiz::controller::{GameEvent, GameListener};

/// Feedback sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Start,
    Correct,
    Incorrect,
    End,
}

impl Cue {
    pub fn file_name(&self) -> &'static str {
        match self {
            Cue::Start => "start.ogg",
            Cue::Correct => "correct.ogg",
            Cue::Incorrect => "incorrect.ogg",
            Cue::End => "end.ogg",
        }
    }
}

impl From<GameEvent> for Cue {
    fn from(event: GameEvent) -> Self {
        match event {
            GameEvent::Started => Cue::Start,
            GameEvent::Correct => Cue::Correct,
            GameEvent::Incorrect => Cue::Incorrect,
            GameEvent::Finished => Cue::End,
        }
    }
}

#[derive(Debug, Error)]
pub enum AudioPlaybackError {
    #[error("sound clip {0} does not exist")]
    MissingClip(PathBuf),
    #[error("could not deliver sound: {0}")]
    Delivery(String),
}

/// Plays cues without waiting for them. Failures are logged by the output.
pub trait CueOutput: Send + Sync {
    fn play(&self, cue: Cue);
}

/// Turns game events into cues.
pub struct CueBoard<O> {
    output: O,
}

impl<O: CueOutput> CueBoard<O> {
    pub fn new(output: O) -> Self {
        Self { output }
    }
}

impl<O: CueOutput> GameListener for CueBoard<O> {
    fn notify(&self, event: GameEvent) {
        self.output.play(Cue::from(event));
    }
}

/// Used when no sounds are configured.
pub struct MutedCues;

impl CueOutput for MutedCues {
    fn play(&self, cue: Cue) {
        debug!("Cue {cue:?} (sounds disabled)");
    }
}

/// One playback task per channel; restarting a channel aborts what it was playing.
pub struct CueChannels<K> {
    playing: Mutex<HashMap<K, JoinHandle<()>>>,
}

impl<K: Eq + Hash> CueChannels<K> {
    pub fn new() -> Self {
        Self {
            playing: Mutex::new(HashMap::new()),
        }
    }

    pub fn restart<F>(&self, channel: K, playback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut playing = self.playing.lock().unwrap_or_else(|e| e.into_inner());
        playing.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = playing.remove(&channel) {
            previous.abort();
        }
        playing.insert(channel, tokio::spawn(playback));
    }
}

impl<K: Eq + Hash> Default for CueChannels<K> {
    fn default() -> Self {
        Self::new()
    }
}
