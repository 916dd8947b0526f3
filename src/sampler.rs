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

//! Ties MIDI input, the sample index, playback and the display together.
//!
//! MIDI events are handled one at a time in arrival order. Rescans run on their
//! own timer so a slow filesystem never holds up a note.

use std::{future::Future, path::Path, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    display::Projector,
    keys::{Key, KeyMap},
    midi::{self, InitError},
    playback::{self, PlaybackEngine},
    router::{Command, Ignored, MidiEventRouter},
    samples::{RescanDelta, SampleIndex, SampleTable},
    util::filename_display,
};

/// Capacity of the MIDI event queue.
const MIDI_QUEUE_SIZE: usize = 64;

pub struct Sampler {
    router: MidiEventRouter,
    table: Arc<SampleTable>,
    index: SampleIndex,
    engine: PlaybackEngine,
    display: Arc<dyn Projector>,
    device_name: String,
    rescan_interval: Duration,
    /// Set once shutdown has run. Held while dispatching so nothing can start
    /// sounding or redraw the display after cleanup.
    shut_down: Mutex<bool>,
}

impl Sampler {
    pub fn new(
        keys: Arc<KeyMap>,
        samples_dir: &Path,
        backend: Arc<dyn playback::Backend>,
        display: Arc<dyn Projector>,
        device_name: &str,
        rescan_interval: Duration,
    ) -> Sampler {
        let table = Arc::new(SampleTable::new(&keys));
        Sampler {
            index: SampleIndex::new(samples_dir, &keys, table.clone()),
            router: MidiEventRouter::new(keys),
            table,
            engine: PlaybackEngine::new(backend),
            display,
            device_name: device_name.to_string(),
            rescan_interval,
            shut_down: Mutex::new(false),
        }
    }

    /// Prepares the samples folder, runs the initial scan and shows the status.
    pub fn start(&self) -> RescanDelta {
        self.index.ensure_layout();
        let delta = self.index.scan();
        if delta.total == 0 {
            warn!(root = ?self.index.root(), "No samples loaded.");
        }

        self.display.set_status(&self.device_name, delta.total);
        self.display.set_now_playing(None);
        self.event(format!("[READY] {} samples", delta.total));
        delta
    }

    /// Handles one raw MIDI message.
    pub fn handle_midi(&self, raw_event: &[u8]) {
        let shut_down = self.shut_down.lock();
        if *shut_down {
            return;
        }

        self.reap_finished();
        match self.router.route(raw_event) {
            Command::Play(key) => self.play(&key),
            Command::Stop(key) => self.stop(&key),
            Command::Ignore(Ignored::Unmapped(note)) => {
                debug!(note, "[SKIP] Note {} - not mapped", note)
            }
            Command::Ignore(reason) => debug!(reason = ?reason, "Ignoring MIDI event."),
        }
    }

    fn play(&self, key: &Key) {
        // A snapshot, so a rescan landing now can't change the list under us.
        let samples = self.table.get(key.name());
        let Some(file) = samples.select() else {
            self.event(format!("[SKIP] {} - no sample", key.name()));
            return;
        };

        match self.engine.play(key, file) {
            Ok(()) => {
                self.display.set_now_playing(Some(key.name()));
                self.event(format!("[PLAY] {} {}", key.name(), filename_display(file)));
            }
            Err(e) => {
                warn!(key = key.name(), err = e.to_string(), "Unable to play sample.");
                self.display.set_now_playing(None);
                self.event(format!("[SKIP] {} - bad sample", key.name()));
            }
        }
    }

    fn stop(&self, key: &Key) {
        self.engine.stop_all();
        self.display.set_now_playing(None);
        self.event(format!("[STOP] {}", key.name()));
    }

    /// Puts the display back to idle once a sample has run out on its own.
    fn reap_finished(&self) {
        if self.engine.reap_finished().is_some() {
            self.display.set_now_playing(None);
        }
    }

    /// Rescans the samples folder. Returns None once shut down.
    pub fn rescan(&self) -> Option<RescanDelta> {
        if self.is_shut_down() {
            return None;
        }
        let delta = self.index.scan();

        // A scan that finishes after shutdown is dropped.
        let shut_down = self.shut_down.lock();
        if *shut_down {
            return None;
        }

        self.reap_finished();
        if delta.changed {
            self.engine.retain_samples(&self.table.selected());
            self.display.update_sample_count(delta.total);
            self.event(format!("[RELOAD] {} samples", delta.total));
        }
        Some(delta)
    }

    /// Stops playback and clears the display. Only the first call does anything;
    /// returns whether this call was it.
    pub fn shutdown(&self) -> bool {
        let mut shut_down = self.shut_down.lock();
        if *shut_down {
            return false;
        }
        *shut_down = true;

        info!("Shutting down.");
        self.engine.stop_all();
        self.display.clear();
        true
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shut_down.lock()
    }

    /// The key that is currently sounding.
    pub fn now_playing(&self) -> Option<String> {
        self.engine
            .now_playing()
            .map(|voice| voice.key().to_string())
    }

    fn event(&self, line: String) {
        info!("{}", line);
        self.display.add_log(&line);
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self: Arc<Self>, midi: Arc<dyn midi::Device>) -> Result<(), InitError> {
        self.run_until(midi, shutdown_signal()).await
    }

    /// Runs until the given future completes or the MIDI device goes away, then
    /// shuts down.
    pub async fn run_until<F>(
        self: Arc<Self>,
        midi: Arc<dyn midi::Device>,
        shutdown: F,
    ) -> Result<(), InitError>
    where
        F: Future<Output = ()> + Send,
    {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(MIDI_QUEUE_SIZE);
        midi.watch_events(midi_events_tx)
            .map_err(|e| InitError::MidiDevice {
                name: midi.name(),
                reason: e.to_string(),
            })?;

        let delta = self.start();
        info!(
            device = self.device_name,
            samples = delta.total,
            rescan_interval = ?self.rescan_interval,
            "Ready, waiting for MIDI input."
        );

        let (stop_rescan_tx, stop_rescan_rx) = watch::channel(false);
        let rescan = tokio::spawn(
            self.clone()
                .rescan_loop(stop_rescan_rx)
                .instrument(info_span!("rescan")),
        );

        let sampler = self.clone();
        async move {
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Shutdown requested.");
                        return;
                    }
                    raw_event = midi_events_rx.recv() => {
                        let Some(raw_event) = raw_event else {
                            info!("MIDI watcher closed.");
                            return;
                        };

                        // Awaited before the next receive to keep events in order.
                        let sampler = sampler.clone();
                        if let Err(e) =
                            tokio::task::spawn_blocking(move || sampler.handle_midi(&raw_event)).await
                        {
                            error!(err = e.to_string(), "Error handling MIDI event.");
                        }
                    }
                }
            }
        }
        .instrument(info_span!("MIDI loop"))
        .await;

        midi.stop_watch_events();
        let _ = stop_rescan_tx.send(true);
        if let Err(e) = rescan.await {
            error!(err = e.to_string(), "Error stopping rescan task.");
        }
        self.shutdown();
        Ok(())
    }

    async fn rescan_loop(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.rescan_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick is immediate, and start() has already scanned.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = stop.changed() => {
                    debug!("Rescan stopped.");
                    return;
                }
                _ = interval.tick() => {
                    let sampler = self.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || sampler.rescan()).await {
                        error!(err = e.to_string(), "Error rescanning samples.");
                    }
                }
            }
        }
    }
}

/// Completes on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => log_signal("SIGINT", result),
                    _ = terminate.recv() => log_signal("SIGTERM", Ok(())),
                }
            }
            Err(e) => {
                warn!(err = e.to_string(), "Unable to listen for SIGTERM.");
                log_signal("SIGINT", tokio::signal::ctrl_c().await);
            }
        }
    }

    #[cfg(not(unix))]
    log_signal("ctrl-c", tokio::signal::ctrl_c().await);
}

fn log_signal(name: &str, result: std::io::Result<()>) {
    match result {
        Ok(()) => info!(signal = name, "Received signal."),
        Err(e) => error!(err = e.to_string(), "Error listening for {}.", name),
    }
}

#[cfg(test)]
mod test {
    use std::{fs, path::PathBuf, sync::Arc};

    use tokio::sync::oneshot;

    use super::*;
    use crate::{
        display::{self, DisplayProjector},
        playback::mock,
        testutil::eventually,
    };

    struct Harness {
        _dir: tempfile::TempDir,
        root: PathBuf,
        sampler: Arc<Sampler>,
        backend: mock::Backend,
        display: Arc<DisplayProjector>,
    }

    impl Harness {
        fn new(rescan_interval: Duration) -> Harness {
            let dir = tempfile::tempdir().expect("tempdir");
            let root = dir.path().join("uploads");
            let backend = mock::Backend::get("mock-output");
            let display = Arc::new(DisplayProjector::new(Box::new(display::mock::Backend::new())));
            let sampler = Arc::new(Sampler::new(
                Arc::new(KeyMap::default()),
                &root,
                Arc::new(backend.clone()),
                display.clone(),
                "mock-keyboard",
                rescan_interval,
            ));
            Harness {
                _dir: dir,
                root,
                sampler,
                backend,
                display,
            }
        }

        fn add_sample(&self, key: &str, name: &str) -> PathBuf {
            let folder = self.root.join(key);
            fs::create_dir_all(&folder).expect("create dir");
            let path = folder.join(name);
            fs::write(&path, b"jingle").expect("write sample");
            path
        }

        fn log(&self) -> Vec<String> {
            self.display
                .state()
                .log()
                .map(str::to_string)
                .collect()
        }
    }

    fn note_on(note: u8) -> [u8; 3] {
        [0x90, note, 100]
    }

    #[test]
    fn test_play_then_stop() {
        let harness = Harness::new(Duration::from_secs(2));
        let a = harness.add_sample("Key5", "a.mp3");
        harness.sampler.start();

        harness.sampler.handle_midi(&note_on(54));
        assert_eq!(vec![a], harness.backend.started());
        assert_eq!(Some("Key5".to_string()), harness.sampler.now_playing());
        assert_eq!(Some("Key5"), harness.display.state().now_playing());

        harness.sampler.handle_midi(&note_on(50));
        assert_eq!(None, harness.sampler.now_playing());
        assert_eq!(0, harness.backend.active());
        assert_eq!(None, harness.display.state().now_playing());
        assert_eq!(
            vec!["[READY] 1 samples", "[PLAY] Key5 a.mp3", "[STOP] Key1"],
            harness.log()
        );
    }

    #[test]
    fn test_rescan_picks_up_new_sample() {
        let harness = Harness::new(Duration::from_secs(2));
        harness.add_sample("Key5", "a.mp3");
        assert_eq!(1, harness.sampler.start().total);

        harness.sampler.handle_midi(&note_on(52));
        assert!(harness.backend.started().is_empty());
        assert_eq!(Some("[SKIP] Key3 - no sample"), harness.log().last().map(String::as_str));

        let b = harness.add_sample("Key3", "b.mp3");
        let delta = harness.sampler.rescan().expect("rescan");
        assert!(delta.changed);
        assert_eq!(2, delta.total);
        assert_eq!(2, harness.display.state().sample_count());
        assert_eq!(Some("[RELOAD] 2 samples"), harness.log().last().map(String::as_str));

        harness.sampler.handle_midi(&note_on(52));
        assert_eq!(vec![b], harness.backend.started());
        assert_eq!(Some("[PLAY] Key3 b.mp3"), harness.log().last().map(String::as_str));

        // Nothing changed, nothing logged.
        assert!(!harness.sampler.rescan().expect("rescan").changed);
        assert_eq!(Some("[PLAY] Key3 b.mp3"), harness.log().last().map(String::as_str));
    }

    #[test]
    fn test_rescan_releases_removed_samples() {
        let harness = Harness::new(Duration::from_secs(2));
        let a = harness.add_sample("Key5", "a.mp3");
        let b = harness.add_sample("Key3", "b.mp3");
        harness.sampler.start();
        harness.sampler.handle_midi(&note_on(54));
        harness.sampler.handle_midi(&note_on(52));

        fs::remove_file(&a).expect("remove");
        let z = harness.add_sample("Key3", "a-new.mp3");
        assert!(harness.sampler.rescan().expect("rescan").changed);

        let retained = harness.backend.retained().expect("retain_samples called");
        assert!(retained.contains(&z));
        assert!(!retained.contains(&a));
        assert!(!retained.contains(&b));
    }

    #[test]
    fn test_bad_sample_is_skipped() {
        let harness = Harness::new(Duration::from_secs(2));
        harness.add_sample("Key4", "good.wav");
        let folder = harness.root.join("Key6");
        fs::create_dir_all(&folder).expect("create dir");
        fs::write(folder.join("broken.wav"), b"").expect("write");
        harness.sampler.start();

        harness.sampler.handle_midi(&note_on(53));
        harness.sampler.handle_midi(&note_on(55));

        assert_eq!(None, harness.sampler.now_playing());
        assert_eq!(0, harness.backend.active());
        assert_eq!(None, harness.display.state().now_playing());
        assert_eq!(Some("[SKIP] Key6 - bad sample"), harness.log().last().map(String::as_str));
    }

    #[test]
    fn test_ignored_events_leave_state_alone() {
        let harness = Harness::new(Duration::from_secs(2));
        harness.add_sample("Key5", "a.mp3");
        harness.sampler.start();
        harness.sampler.handle_midi(&note_on(54));
        let log = harness.log();

        harness.sampler.handle_midi(&[0x80, 54, 0]);
        harness.sampler.handle_midi(&[0x90, 54, 0]);
        harness.sampler.handle_midi(&note_on(100));
        harness.sampler.handle_midi(&[0xB0, 1, 64]);

        assert_eq!(Some("Key5".to_string()), harness.sampler.now_playing());
        assert_eq!(log, harness.log());
    }

    #[test]
    fn test_finished_sample_goes_idle() {
        let harness = Harness::new(Duration::from_secs(2));
        harness.add_sample("Key5", "a.mp3");
        harness.sampler.start();
        harness.sampler.handle_midi(&note_on(54));

        harness.backend.finish();
        harness.sampler.rescan();

        assert_eq!(None, harness.sampler.now_playing());
        assert_eq!(None, harness.display.state().now_playing());
    }

    #[test]
    fn test_shutdown_runs_once() {
        let harness = Harness::new(Duration::from_secs(2));
        harness.add_sample("Key5", "a.mp3");
        harness.sampler.start();
        harness.sampler.handle_midi(&note_on(54));

        let stop_calls = harness.backend.stop_calls();
        assert!(harness.sampler.shutdown());
        assert!(!harness.sampler.shutdown());
        assert_eq!(stop_calls + 1, harness.backend.stop_calls());
        assert_eq!(0, harness.backend.active());
        assert_eq!(display::DisplayState::default(), harness.display.state());

        // Nothing happens after shutdown.
        harness.sampler.handle_midi(&note_on(54));
        assert_eq!(1, harness.backend.started().len());
        assert!(harness.sampler.rescan().is_none());
        assert_eq!(display::DisplayState::default(), harness.display.state());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_until() {
        let harness = Harness::new(Duration::from_millis(20));
        harness.add_sample("Key5", "a.mp3");
        let midi = crate::midi::mock::Device::get("mock-keyboard");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let run = tokio::spawn(harness.sampler.clone().run_until(
            Arc::new(midi.clone()),
            async move {
                let _ = shutdown_rx.await;
            },
        ));

        eventually(|| midi.is_watching(), "MIDI device never watched");
        midi.mock_event(&note_on(54));
        eventually(
            || harness.backend.started().len() == 1,
            "Key5 never played",
        );

        harness.add_sample("Key3", "b.mp3");
        eventually(
            || harness.display.state().sample_count() == 2,
            "Rescan never picked up b.mp3",
        );
        midi.mock_event(&note_on(52));
        eventually(
            || harness.sampler.now_playing() == Some("Key3".to_string()),
            "Key3 never played",
        );

        shutdown_tx.send(()).expect("send shutdown");
        run.await.expect("join").expect("run");

        assert!(harness.sampler.is_shut_down());
        assert!(!midi.is_watching());
        assert_eq!(0, harness.backend.active());
        assert_eq!(display::DisplayState::default(), harness.display.state());
    }
}
