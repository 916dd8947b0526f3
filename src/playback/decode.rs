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

//! Decoding of sample files into memory.
//!
//! Samples are short jingles, so they are decoded entirely up front and then
//! converted to the output stream's format once.

use std::{
    fs::File,
    io,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, warn};

use super::PlaybackError;

const ZERO_SAMPLE_RATE: &str = "sample rate must be greater than 0";

/// A decoded sample held in memory as interleaved f32 frames.
#[derive(Clone, Debug)]
pub struct LoadedSample {
    data: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
    source: Option<PathBuf>,
}

impl LoadedSample {
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
            source: None,
        }
    }

    /// Records the file the sample was decoded from.
    pub fn with_source(mut self, path: &Path) -> LoadedSample {
        self.source = Some(path.to_path_buf());
        self
    }

    /// Decodes the given wav or mp3 file. A malformed file that makes the
    /// decoder panic is reported as a failure like any other bad file.
    pub fn decode(path: &Path) -> Result<LoadedSample, PlaybackError> {
        match panic::catch_unwind(AssertUnwindSafe(|| LoadedSample::decode_file(path))) {
            Ok(result) => result,
            Err(_) => Err(PlaybackError::failed(
                path,
                "decoder panicked on malformed file",
            )),
        }
    }

    fn decode_file(path: &Path) -> Result<LoadedSample, PlaybackError> {
        let file = File::open(path).map_err(|e| PlaybackError::failed(path, e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| PlaybackError::failed(path, e))?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::failed(path, "no audio track found"))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channel_count = track.codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PlaybackError::failed(path, e))?;

        let mut data: Vec<f32> = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(PlaybackError::failed(path, e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = Some(spec.rate);
                    channel_count = Some(spec.channels.count() as u16);

                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    data.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(path = ?path, err = e, "Skipping undecodable packet.");
                }
                Err(e) => return Err(PlaybackError::failed(path, e)),
            }
        }

        let (Some(sample_rate), Some(channel_count)) = (sample_rate, channel_count) else {
            return Err(PlaybackError::failed(path, "unknown sample rate or channels"));
        };
        if sample_rate == 0 {
            return Err(PlaybackError::failed(path, ZERO_SAMPLE_RATE));
        }
        if data.is_empty() || channel_count == 0 {
            return Err(PlaybackError::failed(path, "no audio data"));
        }

        let loaded = LoadedSample::new(data, channel_count, sample_rate).with_source(path);
        debug!(
            path = ?path,
            channels = channel_count,
            sample_rate,
            duration_ms = loaded.duration().as_millis() as u64,
            "Decoded sample."
        );
        Ok(loaded)
    }

    /// Converts the sample to the given channel count and sample rate.
    /// Mono fans out to every output channel; otherwise channels map by index
    /// and surplus source channels are dropped.
    pub fn convert(
        &self,
        channel_count: u16,
        sample_rate: u32,
    ) -> Result<LoadedSample, PlaybackError> {
        if self.sample_rate == 0 || sample_rate == 0 {
            return Err(PlaybackError::failed(
                self.source().unwrap_or(Path::new("in-memory sample")),
                ZERO_SAMPLE_RATE,
            ));
        }
        if channel_count == self.channel_count && sample_rate == self.sample_rate {
            return Ok(self.clone());
        }

        let resampled = if sample_rate == self.sample_rate {
            self.data.as_ref().clone()
        } else {
            resample(&self.data, self.channel_count, self.sample_rate, sample_rate)
        };

        let source_channels = self.channel_count as usize;
        let target_channels = channel_count.max(1) as usize;
        let frames = resampled.len() / source_channels;
        let mut output = Vec::with_capacity(frames * target_channels);
        for frame in resampled.chunks_exact(source_channels) {
            for channel in 0..target_channels {
                output.push(frame[channel.min(source_channels - 1)]);
            }
        }

        Ok(LoadedSample {
            source: self.source.clone(),
            ..LoadedSample::new(output, channel_count, sample_rate)
        })
    }

    /// The file this sample was decoded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of frames in the sample.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Resamples interleaved audio using linear interpolation. Good enough for
/// jingles and one-shots.
fn resample(samples: &[f32], channel_count: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples
                .get(source_frame * channels + channel)
                .copied()
                .unwrap_or(0.0);
            let s1 = samples
                .get((source_frame + 1) * channels + channel)
                .copied()
                .unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }
    output
}

#[cfg(test)]
mod test {
    use std::fs;

    use hound::{SampleFormat, WavSpec, WavWriter};

    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let mut writer = WavWriter::create(
            path,
            WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )
        .expect("create wav");
        for i in 0..frames * channels as usize {
            writer
                .write_sample(((i % 100) as i16 - 50) * 100)
                .expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn test_decode_wav() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jingle.wav");
        write_wav(&path, 2, 22050, 2205);

        let sample = LoadedSample::decode(&path).expect("decode");

        assert_eq!(2, sample.channel_count());
        assert_eq!(22050, sample.sample_rate());
        assert_eq!(2205, sample.frames());
        assert_eq!(100, sample.duration().as_millis());
        assert_eq!(Some(path.as_path()), sample.source());
    }

    #[test]
    fn test_decode_corrupt_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.mp3");
        fs::write(&path, b"this is not an mp3 file at all").expect("write");

        assert!(matches!(
            LoadedSample::decode(&path),
            Err(PlaybackError::Failed { .. })
        ));
        assert!(matches!(
            LoadedSample::decode(&dir.path().join("missing.wav")),
            Err(PlaybackError::Failed { .. })
        ));
    }

    /// A mono 16 bit PCM wav whose header claims a sample rate of 0 Hz.
    fn zero_rate_wav() -> Vec<u8> {
        let data: [u8; 8] = [0x00, 0x10, 0x00, 0xF0, 0x00, 0x10, 0x00, 0xF0];
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // channels
        wav.extend_from_slice(&0u32.to_le_bytes()); // sample rate
        wav.extend_from_slice(&0u32.to_le_bytes()); // byte rate
        wav.extend_from_slice(&2u16.to_le_bytes()); // block align
        wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(data.len() as u32).to_le_bytes());
        wav.extend_from_slice(&data);
        wav
    }

    #[test]
    fn test_decode_zero_sample_rate_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zero.wav");
        fs::write(&path, zero_rate_wav()).expect("write");

        assert!(matches!(
            LoadedSample::decode(&path),
            Err(PlaybackError::Failed { .. })
        ));
    }

    #[test]
    fn test_convert_zero_sample_rate_fails() {
        let sample = LoadedSample::new(vec![0.1, 0.2], 1, 0);
        assert!(matches!(
            sample.convert(2, 48000),
            Err(PlaybackError::Failed { .. })
        ));

        let sample = LoadedSample::new(vec![0.1, 0.2], 1, 48000);
        assert!(matches!(
            sample.convert(2, 0),
            Err(PlaybackError::Failed { .. })
        ));
    }

    #[test]
    fn test_convert_mono_to_stereo() {
        let sample = LoadedSample::new(vec![0.1, 0.2, 0.3], 1, 48000);

        let converted = sample.convert(2, 48000).expect("convert");

        assert_eq!(2, converted.channel_count());
        assert_eq!(vec![0.1f32, 0.1, 0.2, 0.2, 0.3, 0.3], converted.data());
    }

    #[test]
    fn test_convert_drops_surplus_channels() {
        let sample = LoadedSample::new(vec![1.0, -1.0, 0.5, 1.0, -1.0, 0.5], 3, 48000);

        let converted = sample.convert(2, 48000).expect("convert");

        assert_eq!(vec![1.0f32, -1.0, 1.0, -1.0], converted.data());
    }

    #[test]
    fn test_resample_preserves_channels() {
        let source = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];

        let result = resample(&source, 2, 44100, 48000);

        let expected_frames = (4.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(expected_frames * 2, result.len());
        assert!((result[0] - 1.0).abs() < 0.1);
        assert!((result[1] + 1.0).abs() < 0.1);
    }
}
