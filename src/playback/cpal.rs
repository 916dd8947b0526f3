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
    error::Error,
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Sample,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level};

use super::{cache::SampleCache, LoadedSample, PlaybackError};

/// The sample currently being fed to the output stream.
struct ActiveVoice {
    sample: LoadedSample,
    position: usize,
}

type VoiceSlot = Arc<Mutex<Option<ActiveVoice>>>;

/// An audio output device driven through cpal. One output stream is kept open
/// for the life of the device; starting a voice swaps what the stream reads.
pub struct Device {
    name: String,
    channel_count: u16,
    sample_rate: u32,
    voice: VoiceSlot,
    cache: SampleCache,
    closed: Arc<AtomicBool>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl Device {
    /// Opens the named output device, or the host default.
    pub fn get(name: Option<&str>) -> Result<Device, PlaybackError> {
        let host = cpal::default_host();
        let device = match name {
            Some(name) => host
                .output_devices()
                .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?
                .find(|device| device.name().is_ok_and(|n| n.trim() == name))
                .ok_or_else(|| {
                    PlaybackError::DeviceUnavailable(format!("no device found with name {}", name))
                })?,
            None => host.default_output_device().ok_or_else(|| {
                PlaybackError::DeviceUnavailable("no default output device".to_string())
            })?,
        };

        let name = device
            .name()
            .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.config();

        let voice: VoiceSlot = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicBool::new(false));
        let output_thread = Device::start_output_thread(
            device,
            config.clone(),
            sample_format,
            voice.clone(),
            closed.clone(),
        )?;

        info!(
            device = name,
            channels = config.channels,
            sample_rate = config.sample_rate,
            "Audio output ready."
        );

        Ok(Device {
            name,
            channel_count: config.channels,
            sample_rate: config.sample_rate,
            voice,
            cache: SampleCache::new(),
            closed,
            output_thread: Some(output_thread),
        })
    }

    /// Creates the cpal stream on its own thread and keeps it alive until the
    /// device is dropped. Returns once the stream is playing or has failed.
    fn start_output_thread(
        device: cpal::Device,
        config: cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
        voice: VoiceSlot,
        closed: Arc<AtomicBool>,
    ) -> Result<thread::JoinHandle<()>, PlaybackError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        let output_thread = thread::spawn(move || {
            let span = span!(Level::INFO, "audio output (cpal)");
            let _enter = span.enter();

            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, voice),
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, voice),
                cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, voice),
                cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, voice),
                other => Err(format!("unsupported sample format {:?}", other)),
            };

            let stream = match stream.and_then(|stream| {
                stream.play().map_err(|e| e.to_string())?;
                Ok(stream)
            }) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            while !closed.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(100));
            }
            drop(stream);
            debug!("Audio output stream closed.");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(output_thread),
            Ok(Err(e)) => Err(PlaybackError::DeviceUnavailable(e)),
            Err(e) => Err(PlaybackError::DeviceUnavailable(e.to_string())),
        }
    }
}

/// Builds an output stream that copies the active voice into the device buffer
/// and zero-fills everything else.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    voice: VoiceSlot,
) -> Result<cpal::Stream, String>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let silence = T::from_sample(0.0f32);
                // Contended only while a voice is being swapped.
                let Some(mut slot) = voice.try_lock() else {
                    data.fill(silence);
                    return;
                };

                let Some(active) = slot.as_mut() else {
                    data.fill(silence);
                    return;
                };

                let source = active.sample.data();
                let remaining = source.len().saturating_sub(active.position);
                let count = remaining.min(data.len());
                for (dst, src) in data
                    .iter_mut()
                    .zip(&source[active.position..active.position + count])
                {
                    *dst = T::from_sample(*src);
                }
                data[count..].fill(silence);
                active.position += count;

                if active.position >= source.len() {
                    *slot = None;
                }
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
        .map_err(|e| e.to_string())
}

impl super::Backend for Device {
    fn load(&self, path: &Path) -> Result<LoadedSample, PlaybackError> {
        self.cache.load(path, |path| {
            LoadedSample::decode(path)?.convert(self.channel_count, self.sample_rate)
        })
    }

    fn start(&self, sample: LoadedSample) -> Result<(), PlaybackError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(PlaybackError::DeviceUnavailable(
                "output stream closed".to_string(),
            ));
        }
        // Samples loaded through this device already match the stream format.
        let sample = sample.convert(self.channel_count, self.sample_rate)?;
        *self.voice.lock() = Some(ActiveVoice {
            sample,
            position: 0,
        });
        Ok(())
    }

    fn stop(&self) {
        *self.voice.lock() = None;
    }

    fn is_active(&self) -> bool {
        self.voice.lock().is_some()
    }

    fn retain_samples(&self, keep: &HashSet<PathBuf>) {
        self.cache.retain(keep);
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, Rate={})",
            self.name, self.channel_count, self.sample_rate
        )
    }
}

/// Lists output devices across all available cpal hosts.
pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
    let mut devices: Vec<String> = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(config) = device.default_output_config() else {
                continue;
            };
            devices.push(format!(
                "{} (Channels={}) ({})",
                device.name()?,
                config.channels(),
                host_id.name()
            ));
        }
    }

    devices.sort();
    Ok(devices)
}
