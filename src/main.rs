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
mod config;
mod display;
mod keys;
mod midi;
mod playback;
mod router;
mod sampler;
mod samples;
#[cfg(test)]
mod testutil;
mod util;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::playback::LoadedSample;
use crate::sampler::Sampler;
use crate::util::{filename_display, sample_length_display};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=MIDI jingle sampler
After=sound.target

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/jinglebox
ExecStart=/usr/local/bin/jinglebox start "$JINGLEBOX_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=jinglebox.service
"#;

/// Log level used when RUST_LOG is unset or invalid.
const DEFAULT_LOG_LEVEL: &str = "info";

const MIDI_TROUBLESHOOTING: &str = r#"
Troubleshooting:
1. Make sure the MIDI controller is connected
2. Close other applications using MIDI (DAWs, etc.)
3. Run `jinglebox midi-devices` to see what is available
4. Unplug and replug the MIDI device"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI triggered jingle sampler."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will start the sampler.
    Start {
        /// The path to the sampler config. Defaults are used if not given.
        config: Option<String>,
        /// The samples root. Each key has a folder under it.
        #[arg(long)]
        samples_dir: Option<String>,
        /// The MIDI input device name.
        #[arg(short, long)]
        midi_device: Option<String>,
        /// The audio output device name.
        #[arg(short, long)]
        audio_device: Option<String>,
        /// How often to rescan the samples root, e.g. 2s.
        #[arg(short, long)]
        rescan_interval: Option<String>,
        /// Run without the status display.
        #[arg(long)]
        no_display: bool,
        /// The I2C bus of the status display.
        #[arg(long)]
        display_bus: Option<u8>,
        /// The I2C address of the status display, e.g. 0x3C.
        #[arg(long, value_parser = parse_address)]
        display_address: Option<u16>,
    },
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Lists the available audio output devices.
    Devices {},
    /// Lists and verifies the samples for every key under the given directory.
    Samples {
        /// The samples root.
        path: String,
        /// The sampler config to read the key layout from.
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Prints the key to note to folder layout.
    Keys {
        /// The sampler config to read the key layout from.
        config: Option<String>,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

/// Parses a decimal or 0x prefixed hex I2C address.
fn parse_address(address: &str) -> Result<u16, String> {
    let parsed = match address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => address.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid address {}: {}", address, e))
}

/// The message printed when no MIDI input can be opened. Start exits right
/// after printing it.
fn midi_failure_message(err: &midi::InitError) -> String {
    format!("Error: {}\n{}", err, MIDI_TROUBLESHOOTING)
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn load_config(path: Option<&str>) -> Result<config::Sampler, Box<dyn Error>> {
    Ok(match path {
        Some(path) => config::Sampler::deserialize(Path::new(path))?,
        None => config::Sampler::default(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_env_filter(log_filter()).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config,
            samples_dir,
            midi_device,
            audio_device,
            rescan_interval,
            no_display,
            display_bus,
            display_address,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(samples_dir) = samples_dir {
                config.set_samples_dir(PathBuf::from(samples_dir));
            }
            if let Some(midi_device) = midi_device {
                config.set_midi_device(midi_device);
            }
            if let Some(audio_device) = audio_device {
                config.set_audio_device(audio_device);
            }
            if let Some(rescan_interval) = rescan_interval {
                config.set_rescan_interval(rescan_interval);
            }
            if no_display {
                config.display_mut().set_disabled(true);
            }
            if let Some(display_bus) = display_bus {
                config.display_mut().set_bus(display_bus);
            }
            if let Some(display_address) = display_address {
                config.display_mut().set_address(display_address);
            }

            let keys = Arc::new(config.keys().to_key_map()?);
            let rescan_interval = config.rescan_interval()?;

            let midi_device = match midi::get_device(config.midi_device()) {
                Ok(midi_device) => midi_device,
                Err(e) => {
                    eprintln!("{}", midi_failure_message(&e));
                    std::process::exit(1);
                }
            };

            let backend: Arc<dyn playback::Backend> =
                match playback::get_backend(config.audio_device()) {
                    Ok(backend) => backend,
                    Err(e) => {
                        warn!(
                            err = e.to_string(),
                            "Audio output unavailable, every key will be skipped."
                        );
                        Arc::new(playback::Unavailable::new(e))
                    }
                };
            info!(
                midi = midi_device.to_string(),
                audio = backend.to_string(),
                samples = ?config.samples_dir(),
                "Starting sampler."
            );

            let display = display::create(config.display());
            let sampler = Arc::new(Sampler::new(
                keys,
                &config.samples_dir(),
                backend,
                display,
                &midi_device.name(),
                rescan_interval,
            ));
            sampler.run(midi_device).await?;
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;
            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Devices {} => {
            let devices = playback::list_devices()?;
            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Samples { path, config } => {
            let keys = load_config(config.as_deref())?.keys().to_key_map()?;
            let root = PathBuf::from(&path);

            let mut total = 0;
            for key in keys.playable() {
                let files = samples::list_folder(&key.folder(&root))?;
                total += files.len();
                println!("{} (count: {}):", key, files.len());
                for (i, file) in files.iter().enumerate() {
                    let marker = if i == 0 { "*" } else { "-" };
                    match LoadedSample::decode(file) {
                        Ok(sample) => println!(
                            "{} {} ({})",
                            marker,
                            filename_display(file),
                            sample_length_display(sample.duration())
                        ),
                        Err(e) => println!(
                            "{} {} (unplayable: {})",
                            marker,
                            filename_display(file),
                            e
                        ),
                    }
                }
            }
            println!(
                "\nSamples (count: {}), * marks the sample each key plays.",
                total
            );
        }
        Commands::Keys { config } => {
            let config = load_config(config.as_deref())?;
            let keys = config.keys().to_key_map()?;
            let root = config.samples_dir();

            println!("Keys (count: {}):", keys.keys().len());
            for key in keys.keys() {
                if key.is_stop() {
                    println!("- {} STOP", key);
                } else {
                    println!("- {} -> {}", key, key.folder(&root).display());
                }
            }
            println!(
                "\nAccepted extensions: {}",
                samples::ALLOWED_EXTENSIONS.join(", ")
            );
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
