// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{Backend, PlaybackError};
use crate::{keys::Key, util::filename_display};

/// The sample that is currently sounding.
#[derive(Debug, Clone)]
pub struct Voice {
    key: String,
    file: PathBuf,
    started: Instant,
}

impl Voice {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// How long the voice has been sounding.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Plays at most one sample at a time.
///
/// All transitions happen under a single lock, so a concurrent play and stop
/// can never leave two voices sounding.
pub struct PlaybackEngine {
    backend: Arc<dyn Backend>,
    voice: Mutex<Option<Voice>>,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn Backend>) -> PlaybackEngine {
        PlaybackEngine {
            backend,
            voice: Mutex::new(None),
        }
    }

    /// Stops whatever is playing and starts the given file for the key. The STOP
    /// key only stops. If the file can't be played the engine is left stopped.
    pub fn play(&self, key: &Key, file: &Path) -> Result<(), PlaybackError> {
        if key.is_stop() {
            self.stop_all();
            return Ok(());
        }

        let mut voice = self.voice.lock();
        if let Some(previous) = voice.take() {
            debug!(key = previous.key, "Stopping previous voice.");
        }
        self.backend.stop();

        let sample = self.backend.load(file)?;
        if let Err(e) = self.backend.start(sample) {
            self.backend.stop();
            return Err(e);
        }

        info!(
            key = key.name(),
            file = filename_display(file).to_string(),
            "Playing sample."
        );
        *voice = Some(Voice {
            key: key.name().to_string(),
            file: file.to_path_buf(),
            started: Instant::now(),
        });
        Ok(())
    }

    /// Stops the current voice, if any. Returns what was playing.
    pub fn stop_all(&self) -> Option<Voice> {
        let mut voice = self.voice.lock();
        self.backend.stop();
        let stopped = voice.take();
        if let Some(stopped) = stopped.as_ref() {
            info!(key = stopped.key, "Stopped playback.");
        }
        stopped
    }

    /// The voice that is currently sounding.
    pub fn now_playing(&self) -> Option<Voice> {
        self.voice.lock().clone()
    }

    /// Lets the backend drop anything held for samples outside `keep`.
    pub fn retain_samples(&self, keep: &HashSet<PathBuf>) {
        self.backend.retain_samples(keep);
    }

    /// Clears the current voice if the backend has run out of audio for it.
    /// Returns the voice that finished.
    pub fn reap_finished(&self) -> Option<Voice> {
        let mut voice = self.voice.lock();
        if voice.is_none() || self.backend.is_active() {
            return None;
        }

        let finished = voice.take();
        if let Some(finished) = finished.as_ref() {
            debug!(key = finished.key, "Sample finished.");
        }
        finished
    }
}

#[cfg(test)]
mod test {
    use std::{fs, thread};

    use super::*;
    use crate::{keys::KeyMap, playback::mock};

    fn engine() -> (PlaybackEngine, mock::Backend) {
        let backend = mock::Backend::get("mock-output");
        (PlaybackEngine::new(Arc::new(backend.clone())), backend)
    }

    fn sample(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"jingle").expect("write sample");
        path
    }

    #[test]
    fn test_play_replaces_current_voice() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = KeyMap::default();
        let (engine, backend) = engine();
        let a = sample(dir.path(), "a.mp3");
        let b = sample(dir.path(), "b.wav");

        engine
            .play(keys.get("Key5").expect("Key5"), &a)
            .expect("play a");
        engine
            .play(keys.get("Key3").expect("Key3"), &b)
            .expect("play b");

        let voice = engine.now_playing().expect("voice");
        assert_eq!("Key3", voice.key());
        assert_eq!(b, voice.file());
        assert_eq!(vec![a, b], backend.started());
        assert_eq!(1, backend.active());
        assert_eq!(1, backend.max_active());
    }

    #[test]
    fn test_stop_key_stops() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = KeyMap::default();
        let (engine, backend) = engine();
        let a = sample(dir.path(), "a.mp3");

        engine
            .play(keys.get("Key5").expect("Key5"), &a)
            .expect("play");
        engine
            .play(keys.stop_key(), Path::new("ignored.wav"))
            .expect("stop");

        assert!(engine.now_playing().is_none());
        assert_eq!(0, backend.active());
        assert_eq!(1, backend.started().len());
    }

    #[test]
    fn test_failed_load_leaves_engine_stopped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = KeyMap::default();
        let (engine, backend) = engine();
        let a = sample(dir.path(), "a.mp3");
        let empty = dir.path().join("empty.wav");
        fs::write(&empty, b"").expect("write");

        engine
            .play(keys.get("Key5").expect("Key5"), &a)
            .expect("play");
        let result = engine.play(keys.get("Key6").expect("Key6"), &empty);

        assert!(matches!(result, Err(PlaybackError::Failed { .. })));
        assert!(engine.now_playing().is_none());
        assert_eq!(0, backend.active());
    }

    #[test]
    fn test_stop_all_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = KeyMap::default();
        let (engine, _) = engine();
        let a = sample(dir.path(), "a.mp3");

        assert!(engine.stop_all().is_none());
        engine
            .play(keys.get("Key2").expect("Key2"), &a)
            .expect("play");
        assert_eq!("Key2", engine.stop_all().expect("stopped").key());
        assert!(engine.stop_all().is_none());
    }

    #[test]
    fn test_reap_finished() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = KeyMap::default();
        let (engine, backend) = engine();
        let a = sample(dir.path(), "a.mp3");

        engine
            .play(keys.get("Key4").expect("Key4"), &a)
            .expect("play");
        assert!(engine.reap_finished().is_none());

        backend.finish();
        assert_eq!("Key4", engine.reap_finished().expect("finished").key());
        assert!(engine.now_playing().is_none());
        assert!(engine.reap_finished().is_none());
    }

    #[test]
    fn test_concurrent_plays_keep_one_voice() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = Arc::new(KeyMap::default());
        let (engine, backend) = engine();
        let engine = Arc::new(engine);
        let files: Vec<PathBuf> = (0..4)
            .map(|i| sample(dir.path(), &format!("{}.wav", i)))
            .collect();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = engine.clone();
                let keys = keys.clone();
                let file = files[i].clone();
                thread::spawn(move || {
                    let key = keys.get(&format!("Key{}", i + 2)).expect("key");
                    for _ in 0..50 {
                        engine.play(key, &file).expect("play");
                        if i % 2 == 0 {
                            engine.stop_all();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("player panicked");
        }

        assert!(backend.max_active() <= 1);
        assert_eq!(200, backend.started().len());
    }
}
